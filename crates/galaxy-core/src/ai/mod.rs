//! AI decision pipeline.
//!
//! Each AI-driven civilization owns a set of [`AiModule`]s. Once per cadence
//! the pipeline assembles a [`DecisionContext`], asks every module for
//! proposals, and turns them into actions eligible from the next tick.

pub mod advisors;
mod pipeline;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::civilization::{Civilization, Stance};
use crate::events::GameEvent;
use crate::ids::{CivilizationId, Tick};
use crate::shared::SharedState;
use crate::visibility::PublicView;

pub use pipeline::{decide, Cadence, Decisions};

/// An independently pluggable, independently fallible AI component.
#[async_trait]
pub trait AiModule: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_decisions(
        &mut self,
        context: &DecisionContext,
    ) -> anyhow::Result<Vec<ProposedAction>>;
}

/// A module's suggestion, before it is tagged and queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ProposedAction {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Trade,
    Alliance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub partner: CivilizationId,
    pub kind: OpportunityKind,
}

/// Everything a module may look at.
///
/// Other civilizations are only present as public views.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub tick: Tick,
    pub civilization: Civilization,
    pub shared: Arc<SharedState>,
    pub others: Vec<PublicView>,
    pub recent_events: Vec<GameEvent>,
    /// Civilizations this one regards as hostile or at war
    pub threats: Vec<CivilizationId>,
    pub opportunities: Vec<Opportunity>,
}

impl DecisionContext {
    pub fn assemble(
        tick: Tick,
        civilization: Civilization,
        shared: Arc<SharedState>,
        others: Vec<PublicView>,
        recent_events: Vec<GameEvent>,
    ) -> Self {
        let mut threats = Vec::new();
        let mut opportunities = Vec::new();
        for (other, stance) in &civilization.relations.with {
            if stance.is_threatening() {
                threats.push(other.clone());
                continue;
            }
            let kind = match stance {
                Stance::Friendly => OpportunityKind::Trade,
                Stance::Allied => OpportunityKind::Alliance,
                _ => continue,
            };
            opportunities.push(Opportunity {
                partner: other.clone(),
                kind,
            });
        }

        Self {
            tick,
            civilization,
            shared,
            others,
            recent_events,
            threats,
            opportunities,
        }
    }

    pub fn is_threatened(&self) -> bool {
        !self.threats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civilization::{FoundingRequest, Genesis};
    use crate::ids::PlayerId;

    #[test]
    fn threats_and_opportunities_follow_stances() {
        let mut civ = Genesis::new(5).found(
            FoundingRequest::new("a".into(), PlayerId::from("p"), "P"),
            &Default::default(),
        );
        civ.relations.with.insert("b".into(), Stance::AtWar);
        civ.relations.with.insert("c".into(), Stance::Friendly);
        civ.relations.with.insert("d".into(), Stance::Allied);
        civ.relations.with.insert("e".into(), Stance::Wary);

        let context =
            DecisionContext::assemble(3, civ, Arc::default(), Vec::new(), Vec::new());

        assert_eq!(context.threats, vec![CivilizationId::from("b")]);
        assert_eq!(
            context.opportunities,
            vec![
                Opportunity {
                    partner: "c".into(),
                    kind: OpportunityKind::Trade
                },
                Opportunity {
                    partner: "d".into(),
                    kind: OpportunityKind::Alliance
                },
            ]
        );
    }
}
