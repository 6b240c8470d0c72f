//! Player registry and session map.
//!
//! Instance-owned state: every engine has its own registry.

use std::collections::{BTreeMap, HashMap};

use crate::error::EngineError;
use crate::ids::{CivilizationId, PlayerId, Tick};

use super::{ControlType, Player};

/// All players plus the session-to-player mapping
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    sessions: HashMap<String, PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player; identities are never reused while registered
    pub fn insert(&mut self, player: Player) -> Result<(), EngineError> {
        if self.players.contains_key(&player.id) {
            return Err(EngineError::DuplicatePlayer(player.id));
        }

        if let Some(session) = &player.session {
            self.sessions.insert(session.clone(), player.id.clone());
        }
        self.players.insert(player.id.clone(), player);
        Ok(())
    }

    /// Remove a player and any session pointing at it
    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        let player = self.players.remove(id)?;
        self.sessions.retain(|_, owner| owner != id);
        Some(player)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn by_session(&self, session: &str) -> Option<&Player> {
        self.sessions.get(session).and_then(|id| self.players.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// The player currently bound to `civilization`, if any
    pub fn controller_of(&self, civilization: &CivilizationId) -> Option<&Player> {
        self.players.values().find(|p| p.controls(civilization))
    }

    /// Number of players bound to `civilization` (the invariant is exactly one)
    pub fn controller_count(&self, civilization: &CivilizationId) -> usize {
        self.players.values().filter(|p| p.controls(civilization)).count()
    }

    /// Players whose civilization is driven by the AI pipeline, in id order
    pub fn ai_drivers(&self) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(|p| p.control.runs_ai() && p.civilization.is_some())
    }

    /// Disconnected persons whose grace period has run out
    pub fn expired_disconnections(&self, now: Tick, grace: Tick) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.control.is_person() && !p.connected && p.takeover.is_none())
            .filter(|p| {
                p.disconnected_at
                    .is_some_and(|at| now.saturating_sub(at) >= grace)
            })
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.control != ControlType::Observer)
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.control == ControlType::Observer)
            .count()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Capabilities;

    fn player(id: &str, control: ControlType) -> Player {
        Player {
            id: PlayerId::from(id),
            name: id.to_uppercase(),
            control,
            civilization: None,
            session: None,
            connected: true,
            capabilities: Capabilities::defaults_for(control),
            ai: None,
            joined_at: 0,
            last_activity: 0,
            disconnected_at: None,
            takeover: None,
            synthetic: false,
        }
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player("p1", ControlType::Human)).unwrap();

        assert!(matches!(
            registry.insert(player("p1", ControlType::Ai)),
            Err(EngineError::DuplicatePlayer(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_resolve_and_clear_on_remove() {
        let mut registry = PlayerRegistry::new();
        let mut alice = player("alice", ControlType::Human);
        alice.session = Some("sess-1".into());
        registry.insert(alice).unwrap();

        assert_eq!(registry.by_session("sess-1").map(|p| p.name.as_str()), Some("ALICE"));

        registry.remove(&PlayerId::from("alice"));
        assert!(registry.by_session("sess-1").is_none());
    }

    #[test]
    fn observers_do_not_count_as_players() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player("a", ControlType::Human)).unwrap();
        registry.insert(player("b", ControlType::Observer)).unwrap();

        assert_eq!(registry.player_count(), 1);
        assert_eq!(registry.observer_count(), 1);
    }

    #[test]
    fn grace_period_expiry() {
        let mut registry = PlayerRegistry::new();
        let mut alice = player("alice", ControlType::Human);
        alice.connected = false;
        alice.disconnected_at = Some(10);
        registry.insert(alice).unwrap();

        // Before grace period
        assert!(registry.expired_disconnections(14, 5).is_empty());

        // After grace period
        assert_eq!(
            registry.expired_disconnections(15, 5),
            vec![PlayerId::from("alice")]
        );
    }
}
