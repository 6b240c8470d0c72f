//! Runner - drives the engine on a wall-clock interval.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{Engine, GamePhase};

/// Why and when a run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub unit_failures: u64,
    pub flagged: u64,
}

/// Ticks the shared engine once per interval while the game is playing.
pub struct Runner {
    engine: Arc<Mutex<Engine>>,
    interval: Duration,
}

impl Runner {
    pub fn new(engine: Arc<Mutex<Engine>>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run until shutdown is signalled, the game ends, or `max_ticks` ticks
    /// have been processed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>, max_ticks: Option<u64>) -> RunSummary {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = RunSummary::default();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested");
                        break;
                    }
                    continue;
                }
            }

            let mut engine = self.engine.lock().await;
            match engine.phase() {
                GamePhase::Playing => {}
                GamePhase::Ended => break,
                GamePhase::Setup | GamePhase::Paused => continue,
            }

            match engine.process_tick().await {
                Ok(report) => {
                    summary.ticks += 1;
                    summary.unit_failures += report.failures.len() as u64;
                    summary.flagged += report.flagged.len() as u64;
                }
                Err(err) => {
                    warn!(error = %err, "run loop stopping");
                    break;
                }
            }

            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
        }

        info!(ticks = summary.ticks, failures = summary.unit_failures, "run loop finished");
        summary
    }
}
