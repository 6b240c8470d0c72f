//! Tick orchestrator.
//!
//! One tick runs five phases in fixed order. Within a phase every unit (and
//! every civilization) runs concurrently against an immutable snapshot; the
//! phase settles completely before its outputs are applied, in registry
//! order, and before the next phase starts. Completion order never matters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::action;
use crate::ai::{decide, DecisionContext};
use crate::error::{EngineError, EngineResult};
use crate::events::{derive_deltas, EventKind, GameEvent};
use crate::ids::{CivilizationId, PlayerId, Tick};
use crate::units::{
    guarded, BackgroundContext, CivilizationContext, FailureKind, InteractionContext,
    SharedContext, UnitEvent,
};
use crate::visibility::PublicView;

use super::{Engine, GamePhase, Phase, TickReport, UnitFailure};

impl Engine {
    /// Instantiate and initialize the global units. Idempotent.
    pub async fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let missing = self.catalog.report_missing();
        let budget = self.config.unit_timeout();
        self.shared_units = super::lifecycle::ready_units(self.catalog.shared_units(), budget, None).await;
        self.interaction_units =
            super::lifecycle::ready_units(self.catalog.interaction_units(), budget, None).await;
        self.background_units =
            super::lifecycle::ready_units(self.catalog.background_units(), budget, None).await;

        info!(
            shared = self.shared_units.len(),
            interaction = self.interaction_units.len(),
            background = self.background_units.len(),
            missing,
            "engine initialized"
        );
    }

    /// Advance the galaxy by exactly one tick.
    ///
    /// Works in any game phase except `Ended`; the run loop additionally
    /// requires `Playing`. Unit failures are isolated and reported in the
    /// returned [`TickReport`], never as an error.
    pub async fn process_tick(&mut self) -> EngineResult<TickReport> {
        if self.phase == GamePhase::Ended {
            return Err(EngineError::GameEnded);
        }
        self.initialize().await;

        let tick = self.tick;
        let span = info_span!("tick", tick);
        self.run_tick(tick).instrument(span).await
    }

    async fn run_tick(&mut self, tick: Tick) -> EngineResult<TickReport> {
        let started = Instant::now();
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };
        self.shared.tick = tick;

        report.takeovers = self.expire_disconnections(tick).await;
        self.expire_stale_actions(tick, &mut report);
        self.drop_invalidated_actions(tick, &mut report);

        let before = self.civilizations.snapshot_active();

        self.run_shared_phase(tick, &mut report).await;
        self.run_civilization_phase(tick, &mut report).await;
        self.run_interaction_phase(tick, &mut report).await;
        self.run_background_phase(tick, &mut report).await;
        self.run_ai_phase(tick, &mut report).await;

        self.publish(tick, &before, &mut report).await;

        self.tick += 1;
        let elapsed = started.elapsed();
        self.metrics.record_tick(elapsed);
        report.duration_ms = elapsed.as_millis() as u64;

        debug!(
            duration_ms = report.duration_ms,
            failures = report.failures.len(),
            claimed = report.actions_claimed,
            "tick complete"
        );
        Ok(report)
    }

    fn expire_stale_actions(&mut self, tick: Tick, report: &mut TickReport) {
        let expired = self
            .actions
            .expire_stale(tick, self.config.stale_action_ticks);
        if expired.is_empty() {
            return;
        }

        report.actions_expired = expired.len();
        self.metrics.expired_actions += expired.len() as u64;
        debug!(count = expired.len(), "dropping stale actions");

        let summary: Vec<_> = expired
            .iter()
            .map(|a| json!({ "id": a.id, "kind": a.kind, "player": a.player }))
            .collect();
        self.events.queue(
            GameEvent::new(EventKind::ActionsExpired, tick).with_payload(json!({ "actions": summary })),
        );
    }

    /// Re-check claimable actions against current control before any phase
    /// can claim them.
    fn drop_invalidated_actions(&mut self, tick: Tick, report: &mut TickReport) {
        let (players, civilizations) = (&self.players, &self.civilizations);
        let mut reasons = Vec::new();
        let dropped = self.actions.drop_claimable(tick, |action| {
            match action::revalidate(players, civilizations, action) {
                Ok(()) => true,
                Err(err) => {
                    reasons.push(err.to_string());
                    false
                }
            }
        });
        if dropped.is_empty() {
            return;
        }

        report.actions_rejected = dropped.len();
        debug!(count = dropped.len(), "dropping actions whose submitter lost control");

        let summary: Vec<_> = dropped
            .iter()
            .zip(&reasons)
            .map(|(a, reason)| {
                json!({ "id": a.id, "kind": a.kind, "player": a.player, "reason": reason })
            })
            .collect();
        self.events.queue(
            GameEvent::new(EventKind::ActionsRejected, tick).with_payload(json!({ "actions": summary })),
        );
    }

    async fn run_shared_phase(&mut self, tick: Tick, report: &mut TickReport) {
        let snapshot = Arc::new(self.shared.clone());
        let contexts: Vec<SharedContext> = self
            .shared_units
            .iter()
            .map(|unit| SharedContext {
                shared: snapshot.clone(),
                actions: self.actions.claim(tick, unit.claims(), None),
            })
            .collect();
        self.count_claims(report, contexts.iter().map(|c| c.actions.len()));

        let budget = self.config.unit_timeout();
        let outcomes = join_all(self.shared_units.iter_mut().zip(&contexts).map(
            |(unit, context)| async move {
                let name = unit.name().to_owned();
                (name, guarded(budget, unit.process_tick(tick, context)).await)
            },
        ))
        .await;

        for (unit, outcome) in outcomes {
            match outcome {
                Ok(output) => {
                    self.shared.apply_all(&output.changes);
                    self.queue_unit_events(tick, None, output.events);
                }
                Err(kind) => self.record_failure(report, tick, Phase::Shared, unit, None, kind),
            }
        }
        debug!(phase = %Phase::Shared, units = contexts.len(), "phase settled");
    }

    async fn run_civilization_phase(&mut self, tick: Tick, report: &mut TickReport) {
        let shared = Arc::new(self.shared.clone());

        let mut contexts: BTreeMap<CivilizationId, Vec<CivilizationContext>> = BTreeMap::new();
        for (id, units) in &self.civilization_units {
            let Some(civ) = self.civilizations.get(id).filter(|c| c.active) else {
                continue;
            };
            let civ = Arc::new(civ.clone());
            let per_unit = units
                .iter()
                .map(|unit| CivilizationContext {
                    civilization: civ.clone(),
                    shared: shared.clone(),
                    actions: self.actions.claim(tick, unit.claims(), Some(id)),
                })
                .collect();
            contexts.insert(id.clone(), per_unit);
        }
        self.count_claims(
            report,
            contexts.values().flatten().map(|c| c.actions.len()),
        );

        let budget = self.config.unit_timeout();
        let runs = self
            .civilization_units
            .iter_mut()
            .filter_map(|(id, units)| contexts.get(id).map(|ctx| (id, units, ctx)))
            .map(|(id, units, ctx)| async move {
                let outcomes = join_all(units.iter_mut().zip(ctx).map(|(unit, context)| async move {
                    let name = unit.name().to_owned();
                    (name, guarded(budget, unit.process_tick(tick, context)).await)
                }))
                .await;
                (id.clone(), outcomes)
            });
        let results = join_all(runs).await;

        for (civ, outcomes) in results {
            for (unit, outcome) in outcomes {
                let output = match outcome {
                    Ok(output) => output,
                    Err(kind) => {
                        self.record_failure(report, tick, Phase::Civilization, unit, Some(civ.clone()), kind);
                        continue;
                    }
                };
                match self.civilizations.apply(&civ, &output.changes) {
                    Ok(()) => self.queue_unit_events(tick, Some(&civ), output.events),
                    Err(err) => self.record_failure(
                        report,
                        tick,
                        Phase::Civilization,
                        unit,
                        Some(civ.clone()),
                        FailureKind::ChangeRejected(err.to_string()),
                    ),
                }
            }
        }
        debug!(phase = %Phase::Civilization, civilizations = contexts.len(), "phase settled");
    }

    async fn run_interaction_phase(&mut self, tick: Tick, report: &mut TickReport) {
        let shared = Arc::new(self.shared.clone());
        let civilizations = Arc::new(self.civilizations.snapshot_active());
        let contexts: Vec<InteractionContext> = self
            .interaction_units
            .iter()
            .map(|unit| InteractionContext {
                civilizations: civilizations.clone(),
                shared: shared.clone(),
                actions: self.actions.claim(tick, unit.claims(), None),
            })
            .collect();
        self.count_claims(report, contexts.iter().map(|c| c.actions.len()));

        let budget = self.config.unit_timeout();
        let outcomes = join_all(self.interaction_units.iter_mut().zip(&contexts).map(
            |(unit, context)| async move {
                let name = unit.name().to_owned();
                (name, guarded(budget, unit.process_tick(tick, context)).await)
            },
        ))
        .await;

        for (unit, outcome) in outcomes {
            let output = match outcome {
                Ok(output) => output,
                Err(kind) => {
                    self.record_failure(report, tick, Phase::Interaction, unit, None, kind);
                    continue;
                }
            };
            match self.civilizations.apply_many(&output.changes) {
                Ok(()) => self.queue_unit_events(tick, None, output.events),
                Err(err) => self.record_failure(
                    report,
                    tick,
                    Phase::Interaction,
                    unit,
                    None,
                    FailureKind::ChangeRejected(err.to_string()),
                ),
            }
        }
        debug!(phase = %Phase::Interaction, units = contexts.len(), "phase settled");
    }

    async fn run_background_phase(&mut self, tick: Tick, report: &mut TickReport) {
        let shared = Arc::new(self.shared.clone());
        let views: Arc<Vec<PublicView>> =
            Arc::new(self.civilizations.active().map(PublicView::of).collect());
        let contexts: Vec<BackgroundContext> = self
            .background_units
            .iter()
            .map(|unit| BackgroundContext {
                shared: shared.clone(),
                civilizations: views.clone(),
                actions: self.actions.claim(tick, unit.claims(), None),
            })
            .collect();
        self.count_claims(report, contexts.iter().map(|c| c.actions.len()));

        let budget = self.config.unit_timeout();
        let outcomes = join_all(self.background_units.iter_mut().zip(&contexts).map(
            |(unit, context)| async move {
                let name = unit.name().to_owned();
                (name, guarded(budget, unit.process_tick(tick, context)).await)
            },
        ))
        .await;

        for (unit, outcome) in outcomes {
            match outcome {
                Ok(output) => {
                    self.shared.apply_all(&output.changes);
                    self.queue_unit_events(tick, None, output.events);
                }
                Err(kind) => self.record_failure(report, tick, Phase::Background, unit, None, kind),
            }
        }
        debug!(phase = %Phase::Background, units = contexts.len(), "phase settled");
    }

    /// Run the decision pipeline for every AI-driven civilization due to
    /// think. Resulting actions only become claimable next tick.
    async fn run_ai_phase(&mut self, tick: Tick, report: &mut TickReport) {
        let shared = Arc::new(self.shared.clone());

        let mut contexts: BTreeMap<CivilizationId, (PlayerId, DecisionContext)> = BTreeMap::new();
        for player in self.players.ai_drivers() {
            let Some(civ_id) = &player.civilization else {
                continue;
            };
            let Some(civ) = self.civilizations.get(civ_id).filter(|c| c.active) else {
                continue;
            };
            if !self.cadence.should_think(tick, civ_id) || !self.ai_modules.contains_key(civ_id) {
                continue;
            }

            let others = self
                .civilizations
                .active()
                .filter(|other| other.id != *civ_id)
                .map(PublicView::of)
                .collect();
            let context = DecisionContext::assemble(
                tick,
                civ.clone(),
                shared.clone(),
                others,
                self.events.recent_for(civ_id),
            );
            contexts.insert(civ_id.clone(), (player.id.clone(), context));
        }

        let budget = self.config.ai_module_timeout();
        let max_actions = self.config.max_ai_actions_per_civilization;
        let runs = self
            .ai_modules
            .iter_mut()
            .filter_map(|(id, modules)| contexts.get(id).map(|entry| (id, modules, entry)))
            .map(|(id, modules, (player, context))| async move {
                let decisions = decide(modules, context, player, budget, max_actions).await;
                (id.clone(), decisions)
            });
        let results = join_all(runs).await;

        for (civ, decisions) in results {
            self.metrics.ai_calls += (decisions.responded + decisions.failures.len()) as u64;
            for (module, kind) in decisions.failures {
                self.record_failure(report, tick, Phase::AiDecision, module, Some(civ.clone()), kind);
            }
            report.ai_actions_queued += decisions.actions.len();
            for action in decisions.actions {
                self.actions.append(action);
            }
        }
        debug!(
            phase = %Phase::AiDecision,
            civilizations = contexts.len(),
            queued = report.ai_actions_queued,
            "phase settled"
        );
    }

    /// Derive notifications, autosave, close the failure ledger and flush.
    async fn publish(
        &mut self,
        tick: Tick,
        before: &BTreeMap<CivilizationId, crate::civilization::Civilization>,
        report: &mut TickReport,
    ) {
        let deltas: Vec<GameEvent> = before
            .values()
            .filter_map(|old| self.civilizations.get(&old.id).map(|new| (old, new)))
            .flat_map(|(old, new)| derive_deltas(old, new, tick))
            .collect();
        self.events.queue_all(deltas);

        let every = self.config.autosave_every_ticks;
        if every > 0 && (tick + 1) % every == 0 {
            self.save_active().await;
        }

        for civ in self.failures.close_tick() {
            warn!(
                civilization = %civ,
                consecutive = self.failures.consecutive(&civ),
                "civilization flagged for review"
            );
            self.events.queue(
                GameEvent::new(EventKind::CivilizationFlaggedForReview, tick)
                    .for_civilization(civ.clone())
                    .with_payload(json!({ "consecutive": self.failures.consecutive(&civ) })),
            );
            report.flagged.push(civ);
        }

        self.events.queue(GameEvent::new(EventKind::TickCompleted, tick).with_payload(json!({
            "failures": report.failures.len(),
            "actions_claimed": report.actions_claimed,
            "ai_actions_queued": report.ai_actions_queued,
        })));
        report.events_published = self.events.flush();
    }

    fn count_claims(&mut self, report: &mut TickReport, claimed: impl Iterator<Item = usize>) {
        let count: usize = claimed.sum();
        report.actions_claimed += count;
        self.metrics.processed_actions += count as u64;
    }

    fn queue_unit_events(&mut self, tick: Tick, civilization: Option<&CivilizationId>, events: Vec<UnitEvent>) {
        for event in events {
            let mut game_event = GameEvent::new(EventKind::Unit(event.kind), tick).with_payload(event.payload);
            game_event.civilization = civilization.cloned();
            self.events.queue(game_event);
        }
    }

    fn record_failure(
        &mut self,
        report: &mut TickReport,
        tick: Tick,
        phase: Phase,
        unit: String,
        civilization: Option<CivilizationId>,
        kind: FailureKind,
    ) {
        warn!(
            tick,
            phase = %phase,
            unit = %unit,
            civilization = civilization.as_ref().map(CivilizationId::as_str),
            error = %kind,
            "unit failed; isolated"
        );

        let failure = UnitFailure {
            tick,
            phase,
            unit,
            civilization,
            kind,
        };
        let mut event = GameEvent::new(EventKind::UnitFailed, tick)
            .with_payload(serde_json::to_value(&failure).unwrap_or_default());
        event.civilization = failure.civilization.clone();
        self.events.queue(event);

        self.metrics.unit_failures += 1;
        self.failures.record(failure.clone());
        report.failures.push(failure);
    }
}
