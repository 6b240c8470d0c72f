//! Outbound notifications.
//!
//! Events raised during a tick (or between ticks by lifecycle operations) are
//! queued on the [`EventBus`] and flushed to subscribers after the AI-decision
//! phase, together with notifications derived from state deltas.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;

use crate::civilization::Civilization;
use crate::ids::{CivilizationId, Tick};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlayerJoined,
    PlayerLeft,
    PlayerDisconnected,
    PlayerReconnected,
    AiTakeover,
    CivilizationFounded,
    CivilizationDeactivated,
    CivilizationReactivated,
    GamePhaseChanged,
    UnitFailed,
    CivilizationFlaggedForReview,
    ActionsExpired,
    ActionsRejected,
    ResourcesChanged,
    TerritoryChanged,
    RelationsChanged,
    ControlChanged,
    TickCompleted,
    /// Raised by a system unit
    Unit(String),
}

/// One notification on the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,
    pub tick: Tick,
    pub civilization: Option<CivilizationId>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(kind: EventKind, tick: Tick) -> Self {
        Self {
            kind,
            tick,
            civilization: None,
            payload: serde_json::Value::Null,
            emitted_at: Utc::now(),
        }
    }

    pub fn for_civilization(mut self, civilization: CivilizationId) -> Self {
        self.civilization = Some(civilization);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Queue in front of a broadcast channel, plus a bounded recent log.
pub struct EventBus {
    sender: broadcast::Sender<GameEvent>,
    pending: Vec<GameEvent>,
    recent: VecDeque<GameEvent>,
    window: usize,
}

impl EventBus {
    pub fn new(capacity: usize, window: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            pending: Vec::new(),
            recent: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.sender.subscribe()
    }

    pub fn queue(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn queue_all(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.pending.extend(events);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Deliver queued events; returns how many were flushed
    pub fn flush(&mut self) -> usize {
        let events = std::mem::take(&mut self.pending);
        let count = events.len();
        for event in events {
            // No subscribers is fine; the recent log still records it.
            let _ = self.sender.send(event.clone());
            if self.window > 0 {
                if self.recent.len() == self.window {
                    self.recent.pop_front();
                }
                self.recent.push_back(event);
            }
        }
        count
    }

    pub fn recent(&self) -> impl Iterator<Item = &GameEvent> {
        self.recent.iter()
    }

    /// Recent events about one civilization, oldest first
    pub fn recent_for(&self, civilization: &CivilizationId) -> Vec<GameEvent> {
        self.recent
            .iter()
            .filter(|e| e.civilization.as_ref() == Some(civilization))
            .cloned()
            .collect()
    }
}

/// Notifications for what changed in a civilization over one tick.
pub fn derive_deltas(before: &Civilization, after: &Civilization, tick: Tick) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let civ = || after.id.clone();

    if before.resources != after.resources {
        let changed: serde_json::Map<String, serde_json::Value> = after
            .resources
            .iter()
            .filter(|(r, v)| before.resources.get(*r) != *v)
            .map(|(r, v)| {
                let delta = v as i128 - before.resources.get(r) as i128;
                (
                    serde_json::to_value(r)
                        .ok()
                        .and_then(|k| k.as_str().map(str::to_owned))
                        .unwrap_or_default(),
                    json!(delta),
                )
            })
            .collect();
        events.push(
            GameEvent::new(EventKind::ResourcesChanged, tick)
                .for_civilization(civ())
                .with_payload(serde_json::Value::Object(changed)),
        );
    }

    if before.territory != after.territory {
        let gained: Vec<_> = after.territory.difference(&before.territory).collect();
        let lost: Vec<_> = before.territory.difference(&after.territory).collect();
        events.push(
            GameEvent::new(EventKind::TerritoryChanged, tick)
                .for_civilization(civ())
                .with_payload(json!({ "gained": gained, "lost": lost })),
        );
    }

    if before.relations != after.relations {
        events.push(
            GameEvent::new(EventKind::RelationsChanged, tick)
                .for_civilization(civ())
                .with_payload(json!({
                    "public": after.relations.public,
                    "with": after.relations.with,
                })),
        );
    }

    if before.control != after.control || before.owner != after.owner {
        events.push(
            GameEvent::new(EventKind::ControlChanged, tick)
                .for_civilization(civ())
                .with_payload(json!({
                    "from": before.control,
                    "to": after.control,
                    "owner": after.owner,
                })),
        );
    }

    events
}
