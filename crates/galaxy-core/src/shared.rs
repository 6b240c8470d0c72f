//! Galaxy-wide shared state, owned by the orchestrator.
//!
//! Shared and background units read a snapshot of it and answer with
//! [`SharedChange`] lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::Tick;

/// State visible to every civilization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    pub tick: Tick,
    /// In-game days since the galaxy was created
    pub galactic_day: u64,
    pub galaxy_size: Option<u32>,
    /// Free-form state keyed by domain (`markets`, `environment`, ...)
    pub domains: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SharedChange {
    Set { key: String, value: serde_json::Value },
    Remove { key: String },
    AdvanceDays { days: u64 },
    SetGalaxySize { size: u32 },
}

impl SharedState {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.domains.get(key)
    }

    pub fn apply(&mut self, change: &SharedChange) {
        match change {
            SharedChange::Set { key, value } => {
                self.domains.insert(key.clone(), value.clone());
            }
            SharedChange::Remove { key } => {
                self.domains.remove(key);
            }
            SharedChange::AdvanceDays { days } => {
                self.galactic_day = self.galactic_day.saturating_add(*days);
            }
            SharedChange::SetGalaxySize { size } => {
                self.galaxy_size = Some(*size);
            }
        }
    }

    pub fn apply_all(&mut self, changes: &[SharedChange]) {
        for change in changes {
            self.apply(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changes_apply_in_order() {
        let mut state = SharedState::default();
        state.apply_all(&[
            SharedChange::Set {
                key: "markets".into(),
                value: json!({"credits": 1.0}),
            },
            SharedChange::AdvanceDays { days: 2 },
            SharedChange::Set {
                key: "markets".into(),
                value: json!({"credits": 1.2}),
            },
        ]);

        assert_eq!(state.galactic_day, 2);
        assert_eq!(state.get("markets"), Some(&json!({"credits": 1.2})));

        state.apply(&SharedChange::Remove {
            key: "markets".into(),
        });
        assert!(state.get("markets").is_none());
    }
}
