//! Failure ledger for isolated unit and AI-module failures.
//!
//! Failures never propagate to callers. They are kept here for inspection,
//! counted per civilization, and turned into review flags once a
//! civilization keeps failing tick after tick. Flagged civilizations keep
//! running; clearing a flag is an administrative action.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{CivilizationId, Tick};
use crate::units::FailureKind;

use super::Phase;

const RETAINED_FAILURES: usize = 256;

/// One isolated failure, with enough context to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub tick: Tick,
    pub phase: Phase,
    pub unit: String,
    pub civilization: Option<CivilizationId>,
    pub kind: FailureKind,
}

#[derive(Debug)]
pub struct FailureLedger {
    threshold: u32,
    recent: VecDeque<UnitFailure>,
    failing_now: BTreeSet<CivilizationId>,
    consecutive: BTreeMap<CivilizationId, u32>,
    flagged: BTreeSet<CivilizationId>,
    total: u64,
}

impl FailureLedger {
    /// `threshold` of zero disables flagging
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            recent: VecDeque::new(),
            failing_now: BTreeSet::new(),
            consecutive: BTreeMap::new(),
            flagged: BTreeSet::new(),
            total: 0,
        }
    }

    pub fn record(&mut self, failure: UnitFailure) {
        if let Some(civ) = &failure.civilization {
            self.failing_now.insert(civ.clone());
        }
        if self.recent.len() == RETAINED_FAILURES {
            self.recent.pop_front();
        }
        self.recent.push_back(failure);
        self.total += 1;
    }

    /// Update consecutive counters at the end of a tick.
    ///
    /// Returns civilizations that crossed the review threshold this tick.
    pub fn close_tick(&mut self) -> Vec<CivilizationId> {
        let failing = std::mem::take(&mut self.failing_now);
        self.consecutive.retain(|civ, _| failing.contains(civ));

        let mut newly_flagged = Vec::new();
        for civ in failing {
            let count = self.consecutive.entry(civ.clone()).or_insert(0);
            *count += 1;
            if self.threshold > 0 && *count >= self.threshold && self.flagged.insert(civ.clone()) {
                newly_flagged.push(civ);
            }
        }
        newly_flagged
    }

    pub fn recent(&self) -> impl Iterator<Item = &UnitFailure> {
        self.recent.iter()
    }

    pub fn for_tick(&self, tick: Tick) -> impl Iterator<Item = &UnitFailure> {
        self.recent.iter().filter(move |f| f.tick == tick)
    }

    pub fn consecutive(&self, civilization: &CivilizationId) -> u32 {
        self.consecutive.get(civilization).copied().unwrap_or(0)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &CivilizationId> {
        self.flagged.iter()
    }

    pub fn is_flagged(&self, civilization: &CivilizationId) -> bool {
        self.flagged.contains(civilization)
    }

    /// Clear a review flag and restart the count
    pub fn clear_flag(&mut self, civilization: &CivilizationId) -> bool {
        self.consecutive.remove(civilization);
        self.flagged.remove(civilization)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(tick: Tick, civ: &str) -> UnitFailure {
        UnitFailure {
            tick,
            phase: Phase::Civilization,
            unit: "economy".into(),
            civilization: Some(civ.into()),
            kind: FailureKind::Error("boom".into()),
        }
    }

    #[test]
    fn flags_after_consecutive_failures_only() {
        let mut ledger = FailureLedger::new(3);
        let a = CivilizationId::from("a");

        for tick in 0..2 {
            ledger.record(failure(tick, "a"));
            assert!(ledger.close_tick().is_empty());
        }
        // A clean tick resets the streak.
        assert!(ledger.close_tick().is_empty());
        assert_eq!(ledger.consecutive(&a), 0);

        for tick in 3..5 {
            ledger.record(failure(tick, "a"));
            ledger.close_tick();
        }
        ledger.record(failure(5, "a"));
        assert_eq!(ledger.close_tick(), vec![a.clone()]);
        assert!(ledger.is_flagged(&a));

        // Still failing: already flagged, not reported again.
        ledger.record(failure(6, "a"));
        assert!(ledger.close_tick().is_empty());

        assert!(ledger.clear_flag(&a));
        assert!(!ledger.is_flagged(&a));
        assert_eq!(ledger.total(), 6);
    }

    #[test]
    fn multiple_failures_in_one_tick_count_once() {
        let mut ledger = FailureLedger::new(2);
        ledger.record(failure(0, "a"));
        ledger.record(failure(0, "a"));
        ledger.close_tick();
        assert_eq!(ledger.consecutive(&CivilizationId::from("a")), 1);
        assert_eq!(ledger.for_tick(0).count(), 2);
    }
}
