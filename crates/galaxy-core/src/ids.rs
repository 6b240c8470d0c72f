//! Identifiers for players, civilizations and galaxy locations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One discrete simulated time step.
pub type Tick = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Stable numeric id for seeding and staggering.
            pub fn stable_id(&self) -> u64 {
                crate::rng::stable_hash(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id!(
    /// Identity of a connected entity (human, AI, hybrid or observer).
    PlayerId
);

string_id!(
    /// Identity of a civilization record.
    CivilizationId
);

string_id!(
    /// Reference to a location in the galaxy (a system or planet).
    LocationRef
);

impl PlayerId {
    /// Fresh random identity for a player that did not bring one.
    pub fn generate() -> Self {
        Self(format!("player_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Identity of the synthetic AI player created on takeover.
    pub fn synthetic_for(civilization: &CivilizationId) -> Self {
        Self(format!("ai_{civilization}"))
    }
}
