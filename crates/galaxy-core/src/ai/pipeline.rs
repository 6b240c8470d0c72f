use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::action::{Action, ActionOrigin, ActionRequest};
use crate::ids::{CivilizationId, PlayerId, Tick};
use crate::units::{guarded, FailureKind};

use super::{AiModule, DecisionContext};

/// When a civilization's AI thinks.
///
/// Civilizations are staggered by a stable hash of their id so that not
/// every AI runs on the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u32,
}

impl Cadence {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn should_think(&self, tick: Tick, civilization: &CivilizationId) -> bool {
        let every = u64::from(self.every);
        let offset = civilization.stable_id() % every;
        (tick + offset) % every == 0
    }
}

/// Result of one pipeline run for one civilization.
#[derive(Debug, Default)]
pub struct Decisions {
    pub actions: Vec<Action>,
    pub failures: Vec<(String, FailureKind)>,
    /// Modules that answered, even with nothing
    pub responded: usize,
    pub truncated: usize,
}

/// Ask every module concurrently and tag what they propose.
///
/// A failing module contributes nothing. Actions become claimable at
/// `context.tick + 1`.
pub async fn decide(
    modules: &mut [Box<dyn AiModule>],
    context: &DecisionContext,
    player: &PlayerId,
    budget: Duration,
    max_actions: usize,
) -> Decisions {
    let civilization = &context.civilization.id;
    let results = join_all(modules.iter_mut().map(|module| async move {
        let name = module.name().to_owned();
        let outcome = guarded(budget, module.get_decisions(context)).await;
        (name, outcome)
    }))
    .await;

    let mut decisions = Decisions::default();
    for (module, outcome) in results {
        match outcome {
            Ok(proposals) => {
                decisions.responded += 1;
                for proposal in proposals {
                    let request = ActionRequest::new(proposal.kind)
                        .with_payload(proposal.payload)
                        .requiring_civilization();
                    let action = Action::new(
                        request,
                        player.clone(),
                        Some(civilization.clone()),
                        context.tick,
                        ActionOrigin::Ai {
                            module: module.clone(),
                        },
                    )
                    .eligible_from(context.tick + 1);
                    decisions.actions.push(action);
                }
            }
            Err(failure) => {
                warn!(
                    tick = context.tick,
                    civilization = %civilization,
                    module = %module,
                    error = %failure,
                    "AI module failed"
                );
                decisions.failures.push((module, failure));
            }
        }
    }

    if decisions.actions.len() > max_actions {
        decisions.truncated = decisions.actions.len() - max_actions;
        decisions.actions.truncate(max_actions);
        debug!(
            civilization = %civilization,
            dropped = decisions.truncated,
            "AI decision list truncated"
        );
    }

    decisions
}
