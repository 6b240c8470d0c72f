//! Inbound operations for the API layer: action submission and state reads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::action::{self, Action, ActionOrigin, ActionRequest};
use crate::civilization::ControlMode;
use crate::error::{EngineError, EngineResult};
use crate::ids::{CivilizationId, PlayerId, Tick};
use crate::player::{ControlType, Player};
use crate::visibility::{CivilizationView, VisibilityGateway};

use super::{Engine, EngineMetrics, GamePhase};

/// Everything a player's client needs for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerGameState {
    pub tick: Tick,
    pub phase: GamePhase,
    pub galactic_day: u64,
    pub player: Player,
    pub civilization: Option<CivilizationView>,
    pub others: Vec<CivilizationView>,
    pub metrics: EngineMetrics,
    pub average_tick_ms: f64,
}

/// One roster entry: who is in the game and what they control.
#[derive(Debug, Clone, Serialize)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub name: String,
    pub control: ControlType,
    pub connected: bool,
    pub civilization: Option<CivilizationId>,
    pub civilization_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobbyCivilization {
    pub id: CivilizationId,
    pub name: String,
    pub owner: PlayerId,
    pub control: ControlMode,
    pub active: bool,
    pub flagged_for_review: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobbyState {
    pub game_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: GamePhase,
    pub tick: Tick,
    pub galaxy_size: Option<u32>,
    pub player_count: usize,
    pub observers: usize,
    pub ai_players: usize,
    pub max_players: usize,
    pub players: Vec<LobbyPlayer>,
    pub civilizations: Vec<LobbyCivilization>,
}

impl Engine {
    /// Validate and queue a player's action, returning its sequence number.
    ///
    /// Rejections leave the queue untouched.
    pub fn submit_action(&mut self, player_id: &PlayerId, request: ActionRequest) -> EngineResult<u64> {
        let civilization = action::validate(&self.players, &self.civilizations, player_id, &request)?;

        let tick = self.tick;
        if let Some(player) = self.players.get_mut(player_id) {
            player.last_activity = tick;
        }
        let kind = request.kind.clone();
        let id = self.actions.append(Action::new(
            request,
            player_id.clone(),
            civilization,
            tick,
            ActionOrigin::Player,
        ));
        debug!(player = %player_id, action = id, kind = %kind, "action queued");
        Ok(id)
    }

    /// Entry point for the API layer; same contract as [`Engine::submit_action`].
    pub fn process_player_action(&mut self, player_id: &PlayerId, request: ActionRequest) -> EngineResult<u64> {
        self.submit_action(player_id, request)
    }

    /// View of `civ_id` permitted to `requester`.
    pub fn get_civilization_game_state(
        &self,
        civ_id: &CivilizationId,
        requester: &PlayerId,
    ) -> EngineResult<CivilizationView> {
        let player = self
            .players
            .get(requester)
            .ok_or_else(|| EngineError::UnknownPlayer(requester.clone()))?;
        let civ = self
            .civilizations
            .get(civ_id)
            .ok_or_else(|| EngineError::UnknownCivilization(civ_id.clone()))?;
        Ok(VisibilityGateway::view(civ, Some(player), &self.systems_of(civ_id)))
    }

    /// View for an anonymous requester.
    pub fn public_view(&self, civ_id: &CivilizationId) -> EngineResult<CivilizationView> {
        let civ = self
            .civilizations
            .get(civ_id)
            .ok_or_else(|| EngineError::UnknownCivilization(civ_id.clone()))?;
        Ok(VisibilityGateway::view(civ, None, &[]))
    }

    pub fn get_player_game_state(&self, player_id: &PlayerId) -> EngineResult<PlayerGameState> {
        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.clone()))?;

        let civilization = player
            .civilization
            .as_ref()
            .and_then(|id| self.civilizations.get(id))
            .map(|civ| VisibilityGateway::view(civ, Some(player), &self.systems_of(&civ.id)));
        let others = self
            .civilizations
            .active()
            .filter(|civ| !player.controls(&civ.id))
            .map(|civ| VisibilityGateway::view(civ, Some(player), &[]))
            .collect();

        Ok(PlayerGameState {
            tick: self.tick,
            phase: self.phase,
            galactic_day: self.shared.galactic_day,
            player: player.clone(),
            civilization,
            others,
            metrics: self.metrics.clone(),
            average_tick_ms: self.metrics.average_tick_ms(),
        })
    }

    pub fn get_game_lobby_state(&self) -> LobbyState {
        LobbyState {
            game_id: self.game_id,
            created_at: self.created_at,
            phase: self.phase,
            tick: self.tick,
            galaxy_size: self.shared.galaxy_size,
            player_count: self.players.player_count(),
            observers: self.players.observer_count(),
            ai_players: self
                .players
                .iter()
                .filter(|p| p.control == ControlType::Ai)
                .count(),
            max_players: self.config.max_players,
            players: self
                .players
                .iter()
                .map(|p| LobbyPlayer {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    control: p.control,
                    connected: p.connected,
                    civilization: p.civilization.clone(),
                    civilization_name: p
                        .civilization
                        .as_ref()
                        .and_then(|id| self.civilizations.get(id))
                        .map(|civ| civ.name.clone()),
                })
                .collect(),
            civilizations: self
                .civilizations
                .iter()
                .map(|civ| LobbyCivilization {
                    id: civ.id.clone(),
                    name: civ.name.clone(),
                    owner: civ.owner.clone(),
                    control: civ.control,
                    active: civ.active,
                    flagged_for_review: self.failures.is_flagged(&civ.id),
                })
                .collect(),
        }
    }

    pub fn flagged_for_review(&self) -> Vec<CivilizationId> {
        self.failures.flagged().cloned().collect()
    }

    pub fn clear_review_flag(&mut self, civ_id: &CivilizationId) -> EngineResult<bool> {
        if !self.civilizations.contains(civ_id) {
            return Err(EngineError::UnknownCivilization(civ_id.clone()));
        }
        Ok(self.failures.clear_flag(civ_id))
    }
}
