//! Players - connected entities and the civilizations they control.

mod registry;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{CivilizationId, LocationRef, PlayerId, Tick};

pub use registry::PlayerRegistry;

/// How a player's decisions are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Human,
    Ai,
    /// Human player with AI assistance
    Hybrid,
    Observer,
}

impl ControlType {
    /// A person sits behind this player (takeover applies when they leave)
    pub fn is_person(self) -> bool {
        matches!(self, Self::Human | Self::Hybrid)
    }

    /// The AI decision pipeline runs for this player's civilization
    pub fn runs_ai(self) -> bool {
        matches!(self, Self::Ai | Self::Hybrid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiPersonality {
    Aggressive,
    Diplomatic,
    Scientific,
    Economic,
    #[default]
    Balanced,
}

impl AiPersonality {
    pub fn goals(self) -> &'static [&'static str] {
        match self {
            Self::Aggressive => &["military_dominance", "territorial_expansion", "resource_control"],
            Self::Diplomatic => &["alliance_building", "trade_networks", "cultural_influence"],
            Self::Scientific => &[
                "technological_advancement",
                "research_leadership",
                "knowledge_sharing",
            ],
            Self::Economic => &["trade_dominance", "resource_monopoly", "economic_growth"],
            Self::Balanced => &["steady_growth", "defensive_strength", "diplomatic_relations"],
        }
    }

    pub fn strategies(self) -> &'static [&'static str] {
        match self {
            Self::Aggressive => &["rapid_expansion", "military_buildup", "intimidation_diplomacy"],
            Self::Diplomatic => &["alliance_formation", "trade_agreements", "cultural_exchange"],
            Self::Scientific => &["research_focus", "technology_sharing", "peaceful_exploration"],
            Self::Economic => &[
                "trade_route_control",
                "resource_acquisition",
                "market_manipulation",
            ],
            Self::Balanced => &[
                "gradual_expansion",
                "defensive_preparation",
                "opportunistic_growth",
            ],
        }
    }
}

/// AI behavior parameters for AI and hybrid players
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiProfile {
    pub difficulty: AiDifficulty,
    pub personality: AiPersonality,
}

/// Set of action kinds a player may submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<String>);

impl Capabilities {
    /// Wildcard capability granting every action kind
    pub const ALL: &'static str = "all";

    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(kinds.into_iter().map(Into::into).collect())
    }

    pub fn defaults_for(control: ControlType) -> Self {
        match control {
            ControlType::Human => Self::new(["policy", "military", "diplomacy", "trade", "research"]),
            ControlType::Ai => Self::new([Self::ALL]),
            ControlType::Hybrid => Self::new([
                "policy",
                "military",
                "diplomacy",
                "trade",
                "research",
                "ai-assist",
            ]),
            ControlType::Observer => Self::new(["view"]),
        }
    }

    pub fn permits(&self, kind: &str) -> bool {
        self.0.contains(kind) || self.0.contains(Self::ALL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Record of a control switch made in place after a disconnect grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPlaceTakeover {
    pub since: Tick,
    pub previous: ControlType,
}

/// A connected entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub control: ControlType,
    pub civilization: Option<CivilizationId>,
    pub session: Option<String>,
    pub connected: bool,
    pub capabilities: Capabilities,
    pub ai: Option<AiProfile>,
    pub joined_at: Tick,
    pub last_activity: Tick,
    pub disconnected_at: Option<Tick>,
    /// Set while AI drives this player's civilization after a disconnect
    pub takeover: Option<InPlaceTakeover>,
    /// Created by the engine to take over an abandoned civilization
    pub synthetic: bool,
}

impl Player {
    pub fn controls(&self, civilization: &CivilizationId) -> bool {
        self.civilization.as_ref() == Some(civilization)
    }
}

/// Request to join the game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerDescriptor {
    pub id: Option<PlayerId>,
    pub name: String,
    pub control: Option<ControlType>,
    pub civilization: Option<CivilizationId>,
    pub civilization_name: Option<String>,
    pub session: Option<String>,
    pub species: Option<String>,
    pub homeworld: Option<LocationRef>,
    pub government: Option<String>,
    pub capabilities: Option<Capabilities>,
    pub ai: Option<AiProfile>,
}

impl PlayerDescriptor {
    pub fn new(name: impl Into<String>, control: ControlType) -> Self {
        Self {
            name: name.into(),
            control: Some(control),
            ..Self::default()
        }
    }

    pub fn human(name: impl Into<String>) -> Self {
        Self::new(name, ControlType::Human)
    }

    pub fn ai(name: impl Into<String>) -> Self {
        Self::new(name, ControlType::Ai)
    }

    pub fn observer(name: impl Into<String>) -> Self {
        Self::new(name, ControlType::Observer)
    }

    pub fn with_id(mut self, id: impl Into<PlayerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_civilization(mut self, id: impl Into<CivilizationId>) -> Self {
        self.civilization = Some(id.into());
        self
    }

    pub fn with_civilization_name(mut self, name: impl Into<String>) -> Self {
        self.civilization_name = Some(name.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_ai(mut self, profile: AiProfile) -> Self {
        self.ai = Some(profile);
        self
    }

    pub fn control(&self) -> ControlType {
        self.control.unwrap_or(ControlType::Human)
    }
}
