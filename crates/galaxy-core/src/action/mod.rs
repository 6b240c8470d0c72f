//! Action queue - ordered buffer of submitted intents.
//!
//! Actions are immutable once queued and leave the queue exactly once: either
//! claimed by the unit that handles their kind, or dropped as stale.

mod validate;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ids::{CivilizationId, PlayerId, Tick};

pub use validate::{revalidate, validate};

/// What a caller submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Reject unless the submitting player controls a civilization
    #[serde(default)]
    pub requires_civilization: bool,
}

impl ActionRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: serde_json::Value::Null,
            requires_civilization: false,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn requiring_civilization(mut self) -> Self {
        self.requires_civilization = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ActionOrigin {
    Player,
    Ai { module: String },
}

/// A queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Queue-assigned sequence number
    pub id: u64,
    pub kind: String,
    pub player: PlayerId,
    pub civilization: Option<CivilizationId>,
    pub payload: serde_json::Value,
    pub submitted_tick: Tick,
    /// First tick at which a unit may claim this action
    pub eligible_tick: Tick,
    pub origin: ActionOrigin,
}

impl Action {
    pub fn new(
        request: ActionRequest,
        player: PlayerId,
        civilization: Option<CivilizationId>,
        submitted_tick: Tick,
        origin: ActionOrigin,
    ) -> Self {
        Self {
            id: 0,
            kind: request.kind,
            player,
            civilization,
            payload: request.payload,
            submitted_tick,
            eligible_tick: submitted_tick,
            origin,
        }
    }

    /// Defer eligibility (AI decisions wait for the next tick)
    pub fn eligible_from(mut self, tick: Tick) -> Self {
        self.eligible_tick = tick;
        self
    }

    pub fn is_claimable(&self, tick: Tick) -> bool {
        self.eligible_tick <= tick
    }
}

/// Append-only from the outside; only claims and expiry remove entries.
#[derive(Debug, Default)]
pub struct ActionQueue {
    next_id: u64,
    pending: VecDeque<Action>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action and return its sequence number
    pub fn append(&mut self, mut action: Action) -> u64 {
        self.next_id += 1;
        action.id = self.next_id;
        self.pending.push_back(action);
        self.next_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.pending.iter()
    }

    /// Actions a phase running at `tick` may claim
    pub fn claimable(&self, tick: Tick) -> impl Iterator<Item = &Action> {
        self.pending.iter().filter(move |a| a.is_claimable(tick))
    }

    /// Remove and return claimable actions of the given kinds, in queue order.
    ///
    /// With `civilization` set, only actions bound to that civilization match.
    pub fn claim(
        &mut self,
        tick: Tick,
        kinds: &[&str],
        civilization: Option<&CivilizationId>,
    ) -> Vec<Action> {
        if kinds.is_empty() {
            return Vec::new();
        }

        let matches = |a: &Action| {
            a.is_claimable(tick)
                && kinds.contains(&a.kind.as_str())
                && civilization.map_or(true, |c| a.civilization.as_ref() == Some(c))
        };

        let mut claimed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.pending.len());
        for action in self.pending.drain(..) {
            if matches(&action) {
                claimed.push(action);
            } else {
                kept.push_back(action);
            }
        }
        self.pending = kept;
        claimed
    }

    /// Drop claimable actions that have waited more than `max_age` ticks
    pub fn expire_stale(&mut self, tick: Tick, max_age: Tick) -> Vec<Action> {
        let mut expired = Vec::new();
        self.pending.retain(|a| {
            let stale = a.is_claimable(tick) && tick.saturating_sub(a.eligible_tick) > max_age;
            if stale {
                expired.push(a.clone());
            }
            !stale
        });
        expired
    }

    /// Remove claimable actions that `keep` refuses, returning them
    pub fn drop_claimable(
        &mut self,
        tick: Tick,
        mut keep: impl FnMut(&Action) -> bool,
    ) -> Vec<Action> {
        let mut dropped = Vec::new();
        self.pending.retain(|a| {
            if !a.is_claimable(tick) || keep(a) {
                return true;
            }
            dropped.push(a.clone());
            false
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
