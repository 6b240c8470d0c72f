//! Pluggable system units and the per-phase contexts they run against.
//!
//! A unit never mutates engine state. It reads an immutable context and
//! answers with a change list, which the orchestrator applies atomically
//! once every unit in the phase has settled.

mod catalog;
mod guard;

pub mod builtin;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::civilization::{Civilization, CivilizationChange};
use crate::ids::{CivilizationId, Tick};
use crate::shared::{SharedChange, SharedState};
use crate::visibility::PublicView;

pub use catalog::{
    AiDomain, BackgroundDomain, CivilizationDomain, InteractionDomain, SharedDomain, UnitCatalog,
};
pub use guard::{guarded, FailureKind};

/// Binds a phase's input to the output its units produce.
pub trait PhaseContext: Send + Sync {
    type Output: Send + Default;
}

/// Tick-processing contract shared by every system unit.
#[async_trait]
pub trait SystemUnit<C: PhaseContext>: Send + Sync {
    fn name(&self) -> &str;

    /// Action kinds this unit consumes from the queue
    fn claims(&self) -> &[&'static str] {
        &[]
    }

    /// Called once at registration; must be idempotent.
    async fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process_tick(&mut self, tick: Tick, context: &C) -> anyhow::Result<C::Output>;
}

pub type SharedUnit = Box<dyn SystemUnit<SharedContext>>;
pub type CivilizationUnit = Box<dyn SystemUnit<CivilizationContext>>;
pub type InteractionUnit = Box<dyn SystemUnit<InteractionContext>>;
pub type BackgroundUnit = Box<dyn SystemUnit<BackgroundContext>>;

/// Notification raised by a unit, published after the tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEvent {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl UnitEvent {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Output of shared and background units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedOutput {
    pub changes: Vec<SharedChange>,
    pub events: Vec<UnitEvent>,
}

/// Output of a per-civilization unit; it can only address its own record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CivilizationOutput {
    pub changes: Vec<CivilizationChange>,
    pub events: Vec<UnitEvent>,
}

/// Output of an interaction unit, addressed to any civilization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionOutput {
    pub changes: Vec<(CivilizationId, CivilizationChange)>,
    pub events: Vec<UnitEvent>,
}

/// Phase 1 input.
#[derive(Debug, Clone)]
pub struct SharedContext {
    pub shared: Arc<SharedState>,
    pub actions: Vec<Action>,
}

/// Phase 2 input: one civilization and nothing about the others.
#[derive(Debug, Clone)]
pub struct CivilizationContext {
    pub civilization: Arc<Civilization>,
    pub shared: Arc<SharedState>,
    pub actions: Vec<Action>,
}

/// Phase 3 input.
#[derive(Debug, Clone)]
pub struct InteractionContext {
    pub civilizations: Arc<BTreeMap<CivilizationId, Civilization>>,
    pub shared: Arc<SharedState>,
    pub actions: Vec<Action>,
}

/// Phase 4 input; background systems only see public views.
#[derive(Debug, Clone)]
pub struct BackgroundContext {
    pub shared: Arc<SharedState>,
    pub civilizations: Arc<Vec<PublicView>>,
    pub actions: Vec<Action>,
}

impl PhaseContext for SharedContext {
    type Output = SharedOutput;
}

impl PhaseContext for CivilizationContext {
    type Output = CivilizationOutput;
}

impl PhaseContext for InteractionContext {
    type Output = InteractionOutput;
}

impl PhaseContext for BackgroundContext {
    type Output = SharedOutput;
}
