//! Galaxy Core - tick orchestration and civilization lifecycle engine.
//!
//! This crate provides the server-side core of a persistent multiplayer
//! strategy galaxy: the orchestrator that advances simulated time through
//! five fixed phases, the player and civilization registries (including AI
//! takeover of abandoned civilizations), the AI decision pipeline, the action
//! queue, and the visibility gateway that decides what each observer may see.

#![forbid(unsafe_code)]

pub mod action;
pub mod ai;
pub mod civilization;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod kernel;
pub mod persistence;
pub mod player;
pub mod rng;
pub mod shared;
pub mod units;
pub mod visibility;

pub use action::{Action, ActionOrigin, ActionQueue, ActionRequest};
pub use ai::{AiModule, DecisionContext, ProposedAction};
pub use civilization::{Civilization, CivilizationChange, CivilizationRegistry, ControlMode};
pub use config::EngineConfig;
pub use error::{EngineError, ValidationError};
pub use events::{EventKind, GameEvent};
pub use ids::{CivilizationId, LocationRef, PlayerId, Tick};
pub use kernel::{Engine, EngineBuilder, GamePhase, Phase, TickReport};
pub use persistence::{JsonDirStore, MemoryStore, Persistence};
pub use player::{ControlType, Player, PlayerDescriptor, PlayerRegistry};
pub use shared::{SharedChange, SharedState};
pub use units::{SystemUnit, UnitCatalog};
pub use visibility::{CivilizationView, VisibilityGateway};
