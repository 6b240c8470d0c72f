//! Player and civilization lifecycle.
//!
//! Every active civilization has exactly one controlling player at all
//! times. When a person leaves, a synthetic AI player is bound to their
//! civilization before their record is removed. When an AI controller
//! leaves, the civilization is deactivated instead.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::ai::AiModule;
use crate::civilization::{Civilization, ControlMode, FoundingRequest};
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::events::{EventKind, GameEvent};
use crate::ids::{CivilizationId, PlayerId, Tick};
use crate::persistence::PlayerSession;
use crate::player::{
    AiProfile, Capabilities, ControlType, InPlaceTakeover, Player, PlayerDescriptor,
};
use crate::units::{guarded, PhaseContext, SystemUnit};

use super::{Engine, GamePhase};

/// Initialize units, dropping the ones that fail.
pub(super) async fn ready_units<C: PhaseContext>(
    units: Vec<Box<dyn SystemUnit<C>>>,
    budget: Duration,
    civilization: Option<&CivilizationId>,
) -> Vec<Box<dyn SystemUnit<C>>> {
    let mut ready = Vec::with_capacity(units.len());
    for mut unit in units {
        match guarded(budget, unit.initialize()).await {
            Ok(()) => ready.push(unit),
            Err(err) => warn!(
                unit = unit.name(),
                civilization = civilization.map(CivilizationId::as_str),
                error = %err,
                "system failed to initialize; skipping"
            ),
        }
    }
    ready
}

async fn ready_modules(
    modules: Vec<Box<dyn AiModule>>,
    budget: Duration,
    civilization: &CivilizationId,
) -> Vec<Box<dyn AiModule>> {
    let mut ready = Vec::with_capacity(modules.len());
    for mut module in modules {
        match guarded(budget, module.initialize()).await {
            Ok(()) => ready.push(module),
            Err(err) => warn!(
                module = module.name(),
                civilization = %civilization,
                error = %err,
                "AI module failed to initialize; skipping"
            ),
        }
    }
    ready
}

impl Engine {
    /// Register a player, founding or loading their civilization if needed.
    pub async fn register_player(&mut self, descriptor: PlayerDescriptor) -> EngineResult<Player> {
        if self.phase == GamePhase::Ended {
            return Err(EngineError::GameEnded);
        }

        // A live session belongs to a registered player: treat as reconnect.
        let live = descriptor
            .session
            .as_deref()
            .filter(|_| descriptor.id.is_none())
            .and_then(|session| self.players.by_session(session))
            .map(|p| p.id.clone());
        if let Some(existing) = live {
            return self.reconnect_player(&existing).await;
        }

        let descriptor = self.resolve_session(descriptor).await;
        let control = descriptor.control();
        let id = descriptor.id.clone().unwrap_or_else(PlayerId::generate);

        if self.players.contains(&id) {
            return Err(EngineError::DuplicatePlayer(id));
        }
        if control == ControlType::Observer {
            if descriptor.civilization.is_some() {
                return Err(ValidationError::ObserverCannotControl.into());
            }
        } else if self.players.player_count() >= self.config.max_players {
            return Err(EngineError::GameFull(self.config.max_players));
        }

        let profile = descriptor.ai.unwrap_or(AiProfile {
            difficulty: self.config.default_ai_difficulty,
            personality: self.config.default_ai_personality,
        });
        let player = Player {
            id: id.clone(),
            name: descriptor.name.clone(),
            control,
            civilization: descriptor.civilization.clone(),
            session: descriptor.session.clone(),
            connected: true,
            capabilities: descriptor
                .capabilities
                .clone()
                .unwrap_or_else(|| Capabilities::defaults_for(control)),
            ai: control.runs_ai().then_some(profile),
            joined_at: self.tick,
            last_activity: self.tick,
            disconnected_at: None,
            takeover: None,
            synthetic: false,
        };

        if let Some(civ_id) = &descriptor.civilization {
            self.bind_civilization(&player, &descriptor, civ_id).await?;
        }

        self.players.insert(player.clone())?;
        self.save_session(&player).await;

        info!(
            player = %player.id,
            control = ?player.control,
            civilization = player.civilization.as_ref().map(CivilizationId::as_str),
            "player joined"
        );
        let mut event = GameEvent::new(EventKind::PlayerJoined, self.tick).with_payload(json!({
            "player": player.id,
            "name": player.name,
            "control": player.control,
        }));
        event.civilization = player.civilization.clone();
        self.events.queue(event);

        Ok(player)
    }

    /// Fill a session-only descriptor from the saved session.
    async fn resolve_session(&self, mut descriptor: PlayerDescriptor) -> PlayerDescriptor {
        let Some(session_id) = descriptor.session.clone() else {
            return descriptor;
        };
        if descriptor.id.is_some() {
            return descriptor;
        }

        match self.store.load_player_session(&session_id).await {
            Ok(Some(saved)) => {
                debug!(session = %session_id, player = %saved.player, "restoring player session");
                descriptor.id = Some(saved.player);
                if descriptor.name.is_empty() {
                    descriptor.name = saved.name;
                }
                descriptor.control = descriptor.control.or(Some(saved.control));
                descriptor.civilization = descriptor.civilization.or(saved.civilization);
                descriptor.ai = descriptor.ai.or(saved.ai);
            }
            Ok(None) => {}
            Err(err) => warn!(session = %session_id, error = %err, "failed to load player session"),
        }
        descriptor
    }

    /// Found, load or reactivate `civ_id` and bind it to `player`.
    async fn bind_civilization(
        &mut self,
        player: &Player,
        descriptor: &PlayerDescriptor,
        civ_id: &CivilizationId,
    ) -> EngineResult<()> {
        if let Some(existing) = self.civilizations.get(civ_id) {
            if existing.active {
                return Err(EngineError::DuplicateCivilization {
                    civilization: civ_id.clone(),
                    controller: existing.owner.clone(),
                });
            }
            self.events.queue(
                GameEvent::new(EventKind::CivilizationReactivated, self.tick)
                    .for_civilization(civ_id.clone())
                    .with_payload(json!({ "controller": player.id })),
            );
        } else {
            let civilization = match self.store.load_civilization(civ_id).await {
                Ok(Some(saved)) => {
                    info!(civilization = %civ_id, "civilization restored from persistence");
                    saved
                }
                Ok(None) => self.found(player, descriptor, civ_id),
                Err(err) => {
                    warn!(civilization = %civ_id, error = %err, "failed to load civilization; founding anew");
                    self.found(player, descriptor, civ_id)
                }
            };
            self.civilizations.insert(civilization)?;
            self.events.queue(
                GameEvent::new(EventKind::CivilizationFounded, self.tick)
                    .for_civilization(civ_id.clone())
                    .with_payload(json!({ "founder": player.id })),
            );
        }

        if let Some(civ) = self.civilizations.get_mut(civ_id) {
            if player.control == ControlType::Ai {
                civ.assign_ai(player.id.clone(), player.ai.unwrap_or_default());
            } else {
                civ.assign_human(player.id.clone());
            }
        }
        self.attach_systems(civ_id).await;
        if player.control.runs_ai() {
            self.attach_ai(civ_id).await;
        }
        Ok(())
    }

    fn found(&self, player: &Player, descriptor: &PlayerDescriptor, civ_id: &CivilizationId) -> Civilization {
        let request = FoundingRequest {
            name: descriptor.civilization_name.clone(),
            species: descriptor.species.clone(),
            homeworld: descriptor.homeworld.clone(),
            government: descriptor.government.clone(),
            tick: self.tick,
            ..FoundingRequest::new(civ_id.clone(), player.id.clone(), player.name.clone())
        };
        let civ = self.genesis.found(request, &self.civilizations.homeworlds());
        info!(civilization = %civ.id, homeworld = %civ.homeworld, "civilization founded");
        civ
    }

    async fn attach_systems(&mut self, civ_id: &CivilizationId) {
        let Some(civ) = self.civilizations.get(civ_id) else {
            return;
        };
        let units = self.catalog.civilization_units(civ);
        let ready = ready_units(units, self.config.unit_timeout(), Some(civ_id)).await;
        debug!(civilization = %civ_id, systems = ready.len(), "civilization systems attached");
        self.civilization_units.insert(civ_id.clone(), ready);
    }

    async fn attach_ai(&mut self, civ_id: &CivilizationId) {
        if self.ai_modules.contains_key(civ_id) {
            return;
        }
        let Some(civ) = self.civilizations.get(civ_id) else {
            return;
        };
        let modules = self.catalog.ai_modules(civ);
        let ready = ready_modules(modules, self.config.ai_module_timeout(), civ_id).await;
        debug!(civilization = %civ_id, modules = ready.len(), "AI modules attached");
        self.ai_modules.insert(civ_id.clone(), ready);
    }

    /// Remove a player.
    ///
    /// A person's civilization is taken over by a synthetic AI player
    /// first; an AI controller's civilization is deactivated. Observers
    /// leave without side effects.
    pub async fn deregister_player(&mut self, player_id: &PlayerId) -> EngineResult<()> {
        let player = self
            .players
            .get(player_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.clone()))?;

        let active_civ = player
            .civilization
            .clone()
            .filter(|id| self.civilizations.get(id).is_some_and(|c| c.active));

        if let Some(civ_id) = active_civ {
            if player.control == ControlType::Ai && player.takeover.is_none() {
                self.deactivate(&civ_id).await;
            } else {
                self.take_over(&civ_id).await?;
            }
        }

        self.players.remove(player_id);
        info!(player = %player_id, "player left");
        let mut event = GameEvent::new(EventKind::PlayerLeft, self.tick)
            .with_payload(json!({ "player": player_id, "control": player.control }));
        event.civilization = player.civilization;
        self.events.queue(event);
        Ok(())
    }

    /// Hand a civilization to a synthetic AI player (administrative).
    ///
    /// Returns the new controller; an AI-controlled civilization is left as is.
    pub async fn convert_to_ai(&mut self, civ_id: &CivilizationId) -> EngineResult<PlayerId> {
        let civ = self
            .civilizations
            .get(civ_id)
            .ok_or_else(|| EngineError::UnknownCivilization(civ_id.clone()))?;
        if !civ.active {
            return Err(ValidationError::InactiveCivilization(civ_id.clone()).into());
        }

        match self.players.controller_of(civ_id) {
            Some(current) if current.control == ControlType::Ai => Ok(current.id.clone()),
            _ => self.take_over(civ_id).await,
        }
    }

    /// Bind a fresh synthetic AI player to `civ_id`, unbinding whoever
    /// controlled it. Both happen before this returns.
    async fn take_over(&mut self, civ_id: &CivilizationId) -> EngineResult<PlayerId> {
        let previous = self.players.controller_of(civ_id).map(|p| p.id.clone());

        let mut ai_id = PlayerId::synthetic_for(civ_id);
        let mut suffix = 1;
        while self.players.contains(&ai_id) {
            suffix += 1;
            ai_id = PlayerId::new(format!("ai_{civ_id}_{suffix}"));
        }

        let profile = AiProfile {
            difficulty: self.config.default_ai_difficulty,
            personality: self.config.default_ai_personality,
        };
        let synthetic = Player {
            id: ai_id.clone(),
            name: format!("AI Controller ({civ_id})"),
            control: ControlType::Ai,
            civilization: Some(civ_id.clone()),
            session: None,
            connected: true,
            capabilities: Capabilities::defaults_for(ControlType::Ai),
            ai: Some(profile),
            joined_at: self.tick,
            last_activity: self.tick,
            disconnected_at: None,
            takeover: None,
            synthetic: true,
        };

        if let Some(prev) = previous.as_ref().and_then(|id| self.players.get_mut(id)) {
            prev.civilization = None;
            prev.takeover = None;
        }
        let civ = self
            .civilizations
            .get_mut(civ_id)
            .ok_or_else(|| EngineError::UnknownCivilization(civ_id.clone()))?;
        civ.assign_ai(ai_id.clone(), profile);
        self.players.insert(synthetic)?;
        self.attach_ai(civ_id).await;

        info!(
            civilization = %civ_id,
            controller = %ai_id,
            previous = previous.as_ref().map(PlayerId::as_str),
            "AI took over civilization"
        );
        self.events.queue(
            GameEvent::new(EventKind::AiTakeover, self.tick)
                .for_civilization(civ_id.clone())
                .with_payload(json!({
                    "controller": ai_id,
                    "previous": previous,
                    "in_place": false,
                })),
        );
        Ok(ai_id)
    }

    async fn deactivate(&mut self, civ_id: &CivilizationId) {
        if !self.civilizations.deactivate(civ_id) {
            return;
        }
        self.civilization_units.remove(civ_id);
        self.ai_modules.remove(civ_id);

        if let Some(civ) = self.civilizations.get(civ_id) {
            if let Err(err) = self.store.save_civilization(civ).await {
                warn!(civilization = %civ_id, error = %err, "failed to save civilization");
            }
        }
        info!(civilization = %civ_id, "civilization deactivated");
        self.events.queue(
            GameEvent::new(EventKind::CivilizationDeactivated, self.tick).for_civilization(civ_id.clone()),
        );
    }

    /// Mark a player disconnected. A person keeps control for the grace
    /// period; after that the AI drives their civilization in place.
    pub fn disconnect_player(&mut self, player_id: &PlayerId) -> EngineResult<()> {
        let tick = self.tick;
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.clone()))?;
        if !player.connected {
            return Ok(());
        }
        player.connected = false;
        player.disconnected_at = Some(tick);

        info!(player = %player_id, "player disconnected");
        let mut event = GameEvent::new(EventKind::PlayerDisconnected, tick)
            .with_payload(json!({ "player": player_id }));
        event.civilization = player.civilization.clone();
        self.events.queue(event);
        Ok(())
    }

    /// Restore a player's connection, handing control back after an
    /// in-place takeover.
    pub async fn reconnect_player(&mut self, player_id: &PlayerId) -> EngineResult<Player> {
        let tick = self.tick;
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.clone()))?;
        player.connected = true;
        player.disconnected_at = None;
        player.last_activity = tick;

        let restored = player.takeover.take().map(|t| t.previous);
        if let Some(previous) = restored {
            player.control = previous;
            player.capabilities = Capabilities::defaults_for(previous);
            if !previous.runs_ai() {
                player.ai = None;
            }
        }
        let player = player.clone();

        if let (Some(previous), Some(civ_id)) = (restored, &player.civilization) {
            if let Some(civ) = self.civilizations.get_mut(civ_id) {
                civ.assign_human(player.id.clone());
            }
            if !previous.runs_ai() {
                self.ai_modules.remove(civ_id);
            }
            info!(player = %player.id, civilization = %civ_id, "control handed back");
        }

        info!(player = %player.id, "player reconnected");
        let mut event = GameEvent::new(EventKind::PlayerReconnected, tick)
            .with_payload(json!({ "player": player.id, "handed_back": restored.is_some() }));
        event.civilization = player.civilization.clone();
        self.events.queue(event);
        Ok(player)
    }

    /// Switch persons whose grace period ran out to AI control in place.
    pub(super) async fn expire_disconnections(&mut self, tick: Tick) -> usize {
        let expired = self
            .players
            .expired_disconnections(tick, self.config.disconnect_grace_ticks);

        let mut count = 0;
        for player_id in expired {
            let Some(civ_id) = self
                .players
                .get(&player_id)
                .and_then(|p| p.civilization.clone())
            else {
                continue;
            };
            let Some(civ) = self.civilizations.get_mut(&civ_id) else {
                continue;
            };
            if !civ.active || civ.control == ControlMode::AiControlled {
                continue;
            }
            let Some(player) = self.players.get_mut(&player_id) else {
                continue;
            };

            let profile = player.ai.unwrap_or(AiProfile {
                difficulty: self.config.default_ai_difficulty,
                personality: self.config.default_ai_personality,
            });
            player.takeover = Some(InPlaceTakeover {
                since: tick,
                previous: player.control,
            });
            player.control = ControlType::Ai;
            player.ai = Some(profile);
            civ.assign_ai(player_id.clone(), profile);
            self.attach_ai(&civ_id).await;
            count += 1;

            info!(player = %player_id, civilization = %civ_id, "grace period over; AI in control");
            self.events.queue(
                GameEvent::new(EventKind::AiTakeover, tick)
                    .for_civilization(civ_id)
                    .with_payload(json!({ "controller": player_id, "in_place": true })),
            );
        }
        count
    }

    pub fn start(&mut self) -> EngineResult<GamePhase> {
        self.transition(&[GamePhase::Setup, GamePhase::Paused], GamePhase::Playing)
    }

    pub fn pause(&mut self) -> EngineResult<GamePhase> {
        self.transition(&[GamePhase::Playing], GamePhase::Paused)
    }

    pub fn resume(&mut self) -> EngineResult<GamePhase> {
        self.transition(&[GamePhase::Paused], GamePhase::Playing)
    }

    /// End the game and save every active civilization.
    pub async fn end(&mut self) -> EngineResult<GamePhase> {
        let phase = self.transition(
            &[GamePhase::Setup, GamePhase::Playing, GamePhase::Paused],
            GamePhase::Ended,
        )?;
        self.save_active().await;
        self.events.flush();
        Ok(phase)
    }

    fn transition(&mut self, from: &[GamePhase], to: GamePhase) -> EngineResult<GamePhase> {
        if self.phase == GamePhase::Ended {
            return Err(EngineError::GameEnded);
        }
        if !from.contains(&self.phase) {
            debug!(from = ?self.phase, to = ?to, "ignoring game phase transition");
            return Ok(self.phase);
        }

        info!(from = ?self.phase, to = ?to, "game phase changed");
        self.events.queue(
            GameEvent::new(EventKind::GamePhaseChanged, self.tick)
                .with_payload(json!({ "from": self.phase, "to": to })),
        );
        self.phase = to;
        Ok(to)
    }

    pub(super) async fn save_active(&self) {
        let mut saved = 0;
        for civ in self.civilizations.active() {
            match self.store.save_civilization(civ).await {
                Ok(()) => saved += 1,
                Err(err) => warn!(civilization = %civ.id, error = %err, "failed to save civilization"),
            }
        }
        debug!(saved, "civilizations saved");
    }

    async fn save_session(&self, player: &Player) {
        let Some(session_id) = &player.session else {
            return;
        };
        let session = PlayerSession {
            session_id: session_id.clone(),
            player: player.id.clone(),
            name: player.name.clone(),
            control: player.control,
            civilization: player.civilization.clone(),
            ai: player.ai,
            saved_at: Utc::now(),
        };
        if let Err(err) = self.store.save_player_session(&session).await {
            warn!(player = %player.id, error = %err, "failed to save player session");
        }
    }
}
