//! Instrumented units shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use galaxy_core::ai::{AiModule, DecisionContext, ProposedAction};
use galaxy_core::civilization::CivilizationChange;
use galaxy_core::ids::Tick;
use galaxy_core::units::{
    BackgroundContext, CivilizationContext, CivilizationOutput, InteractionContext,
    InteractionOutput, PhaseContext, SharedContext, SystemUnit,
};
use galaxy_core::CivilizationId;

/// Shared log of what ran, in order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Records `"<label>@<tick>"` each time it runs.
pub struct Probe {
    pub label: String,
    pub recorder: Recorder,
}

impl Probe {
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }
}

macro_rules! probe_for {
    ($context:ty) => {
        #[async_trait]
        impl SystemUnit<$context> for Probe {
            fn name(&self) -> &str {
                &self.label
            }

            async fn process_tick(
                &mut self,
                tick: Tick,
                _context: &$context,
            ) -> anyhow::Result<<$context as PhaseContext>::Output> {
                self.recorder.push(format!("{}@{}", self.label, tick));
                Ok(Default::default())
            }
        }
    };
}

probe_for!(SharedContext);
probe_for!(CivilizationContext);
probe_for!(InteractionContext);
probe_for!(BackgroundContext);

#[async_trait]
impl AiModule for Probe {
    fn name(&self) -> &str {
        &self.label
    }

    async fn get_decisions(
        &mut self,
        context: &DecisionContext,
    ) -> anyhow::Result<Vec<ProposedAction>> {
        self.recorder.push(format!("{}@{}", self.label, context.tick));
        Ok(vec![ProposedAction::new("probe", json!({ "tick": context.tick }))])
    }
}

/// AI module that never answers.
pub struct StalledAdvisor;

#[async_trait]
impl AiModule for StalledAdvisor {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn get_decisions(
        &mut self,
        _context: &DecisionContext,
    ) -> anyhow::Result<Vec<ProposedAction>> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(Vec::new())
    }
}

/// What a misbehaving unit does for its target civilization.
#[derive(Clone, Copy, Debug)]
pub enum Misbehavior {
    Fail,
    Panic,
    Hang,
}

/// Misbehaves for one civilization, pays +1 credit to every other.
pub struct Saboteur {
    pub target: CivilizationId,
    pub how: Misbehavior,
}

#[async_trait]
impl SystemUnit<CivilizationContext> for Saboteur {
    fn name(&self) -> &str {
        "saboteur"
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        if context.civilization.id == self.target {
            match self.how {
                Misbehavior::Fail => anyhow::bail!("ledger corrupted"),
                Misbehavior::Panic => panic!("unit exploded"),
                Misbehavior::Hang => tokio::time::sleep(Duration::from_secs(3_600)).await,
            }
        }
        Ok(CivilizationOutput {
            changes: vec![CivilizationChange::AdjustResource {
                resource: galaxy_core::civilization::Resource::Credits,
                delta: 1,
            }],
            events: Vec::new(),
        })
    }
}

/// Claims `probe` actions and records how many it received per tick.
pub struct ProbeClaimer {
    pub recorder: Recorder,
}

#[async_trait]
impl SystemUnit<CivilizationContext> for ProbeClaimer {
    fn name(&self) -> &str {
        "probe_claimer"
    }

    fn claims(&self) -> &[&'static str] {
        &["probe"]
    }

    async fn process_tick(
        &mut self,
        tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        if !context.actions.is_empty() {
            self.recorder
                .push(format!("claimed {}@{}", context.actions.len(), tick));
        }
        Ok(CivilizationOutput::default())
    }
}

#[async_trait]
impl SystemUnit<InteractionContext> for ProbeClaimer {
    fn name(&self) -> &str {
        "probe_claimer"
    }

    fn claims(&self) -> &[&'static str] {
        &["probe"]
    }

    async fn process_tick(
        &mut self,
        tick: Tick,
        context: &InteractionContext,
    ) -> anyhow::Result<InteractionOutput> {
        for action in &context.actions {
            self.recorder
                .push(format!("claimed {} from {}@{}", action.kind, action.player, tick));
        }
        Ok(InteractionOutput::default())
    }
}

/// Requests a change list that cannot be applied as a whole.
pub struct Overreach;

#[async_trait]
impl SystemUnit<CivilizationContext> for Overreach {
    fn name(&self) -> &str {
        "overreach"
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        Ok(CivilizationOutput {
            changes: vec![
                CivilizationChange::AdjustResource {
                    resource: galaxy_core::civilization::Resource::Credits,
                    delta: 500,
                },
                CivilizationChange::CedeTerritory {
                    location: context.civilization.homeworld.clone(),
                },
            ],
            events: Vec::new(),
        })
    }
}
