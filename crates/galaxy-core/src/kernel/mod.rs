//! Kernel - the engine, its tick orchestrator and lifecycle operations.
//!
//! All game state is owned by one [`Engine`] instance. Nothing is global,
//! so any number of engines can live side by side (tests rely on this).

mod failures;
mod lifecycle;
mod orchestrator;
mod queries;
mod runner;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::action::ActionQueue;
use crate::ai::{AiModule, Cadence};
use crate::civilization::{CivilizationRegistry, Genesis};
use crate::config::EngineConfig;
use crate::events::{EventBus, GameEvent};
use crate::ids::{CivilizationId, Tick};
use crate::persistence::{MemoryStore, Persistence};
use crate::player::PlayerRegistry;
use crate::shared::SharedState;
use crate::units::{BackgroundUnit, CivilizationUnit, InteractionUnit, SharedUnit, UnitCatalog};

pub use failures::{FailureLedger, UnitFailure};
pub use queries::{LobbyCivilization, LobbyPlayer, LobbyState, PlayerGameState};
pub use runner::{RunSummary, Runner};

/// Overall game state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Setup,
    Playing,
    Paused,
    Ended,
}

/// The five sub-stages of a tick, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Shared,
    Civilization,
    Interaction,
    Background,
    AiDecision,
}

impl Phase {
    pub const ORDER: [Phase; 5] = [
        Phase::Shared,
        Phase::Civilization,
        Phase::Interaction,
        Phase::Background,
        Phase::AiDecision,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Civilization => "civilization",
            Self::Interaction => "interaction",
            Self::Background => "background",
            Self::AiDecision => "ai_decision",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: Tick,
    pub duration_ms: u64,
    pub actions_claimed: usize,
    pub actions_expired: usize,
    /// Claimable actions dropped because their submitter lost control
    pub actions_rejected: usize,
    pub ai_actions_queued: usize,
    pub takeovers: usize,
    pub failures: Vec<UnitFailure>,
    pub flagged: Vec<CivilizationId>,
    pub events_published: usize,
}

/// Running performance counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub ticks_processed: u64,
    pub total_tick_time_ms: u64,
    pub last_tick_ms: u64,
    pub processed_actions: u64,
    pub expired_actions: u64,
    pub ai_calls: u64,
    pub unit_failures: u64,
}

impl EngineMetrics {
    pub fn average_tick_ms(&self) -> f64 {
        if self.ticks_processed == 0 {
            0.0
        } else {
            self.total_tick_time_ms as f64 / self.ticks_processed as f64
        }
    }

    fn record_tick(&mut self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.ticks_processed += 1;
        self.total_tick_time_ms += ms;
        self.last_tick_ms = ms;
    }
}

/// The game engine: registries, unit instances, queue and event sink.
pub struct Engine {
    game_id: Uuid,
    created_at: DateTime<Utc>,
    config: EngineConfig,
    phase: GamePhase,
    tick: Tick,
    initialized: bool,

    shared: SharedState,
    players: PlayerRegistry,
    civilizations: CivilizationRegistry,
    actions: ActionQueue,

    catalog: UnitCatalog,
    genesis: Genesis,
    cadence: Cadence,
    shared_units: Vec<SharedUnit>,
    civilization_units: BTreeMap<CivilizationId, Vec<CivilizationUnit>>,
    interaction_units: Vec<InteractionUnit>,
    background_units: Vec<BackgroundUnit>,
    ai_modules: BTreeMap<CivilizationId, Vec<Box<dyn AiModule>>>,

    events: EventBus,
    failures: FailureLedger,
    metrics: EngineMetrics,
    store: Arc<dyn Persistence>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn civilizations(&self) -> &CivilizationRegistry {
        &self.civilizations
    }

    pub fn actions(&self) -> &ActionQueue {
        &self.actions
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn failures(&self) -> &FailureLedger {
        &self.failures
    }

    /// Subscribe to the outbound event channel
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.recent()
    }

    /// Names of the per-civilization systems attached to `civilization`
    pub fn systems_of(&self, civilization: &CivilizationId) -> Vec<String> {
        self.civilization_units
            .get(civilization)
            .map(|units| units.iter().map(|u| u.name().to_owned()).collect())
            .unwrap_or_default()
    }

    pub fn ai_modules_of(&self, civilization: &CivilizationId) -> Vec<String> {
        self.ai_modules
            .get(civilization)
            .map(|modules| modules.iter().map(|m| m.name().to_owned()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("game_id", &self.game_id)
            .field("phase", &self.phase)
            .field("tick", &self.tick)
            .field("players", &self.players.len())
            .field("civilizations", &self.civilizations.len())
            .field("queued_actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    catalog: Option<UnitCatalog>,
    store: Option<Arc<dyn Persistence>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn catalog(mut self, catalog: UnitCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn persistence(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Engine {
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Persistence>);

        Engine {
            game_id: Uuid::new_v4(),
            created_at: Utc::now(),
            phase: GamePhase::Setup,
            tick: 0,
            initialized: false,
            shared: SharedState::default(),
            players: PlayerRegistry::new(),
            civilizations: CivilizationRegistry::new(),
            actions: ActionQueue::new(),
            catalog: self.catalog.unwrap_or_default(),
            genesis: Genesis::new(config.seed),
            cadence: Cadence::new(config.ai_think_every_ticks),
            shared_units: Vec::new(),
            civilization_units: BTreeMap::new(),
            interaction_units: Vec::new(),
            background_units: Vec::new(),
            ai_modules: BTreeMap::new(),
            events: EventBus::new(config.event_channel_capacity, config.recent_event_window),
            failures: FailureLedger::new(config.failure_review_threshold),
            metrics: EngineMetrics::default(),
            store,
            config,
        }
    }
}
