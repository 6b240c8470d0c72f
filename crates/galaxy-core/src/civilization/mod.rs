//! Civilizations - the canonical per-empire records.

mod change;
mod genesis;
mod registry;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::{CivilizationId, LocationRef, PlayerId, Tick};
use crate::player::AiProfile;

pub use change::{ChangeError, CivilizationChange};
pub use genesis::{starting_resources, FoundingRequest, Genesis};
pub use registry::CivilizationRegistry;

/// Who is currently steering a civilization.
///
/// `Uncontrolled` only exists while a record is being founded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Uncontrolled,
    HumanControlled,
    AiControlled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Credits,
    Minerals,
    Energy,
    Food,
    Research,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Credits,
        Resource::Minerals,
        Resource::Energy,
        Resource::Food,
        Resource::Research,
    ];
}

/// Apply a signed delta to an unsigned quantity, clamping at 0 and `u64::MAX`.
pub(crate) fn saturating_signed(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta.unsigned_abs())
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}

/// Stockpiles by resource. Quantities are unsigned, so never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLedger(BTreeMap<Resource, u64>);

impl ResourceLedger {
    pub fn get(&self, resource: Resource) -> u64 {
        self.0.get(&resource).copied().unwrap_or(0)
    }

    pub fn set(&mut self, resource: Resource, amount: u64) {
        self.0.insert(resource, amount);
    }

    /// Apply a signed delta, saturating at zero
    pub fn adjust(&mut self, resource: Resource, delta: i64) {
        self.set(resource, saturating_signed(self.get(resource), delta));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, u64)> + '_ {
        self.0.iter().map(|(r, v)| (*r, *v))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub level: u32,
    pub researched: Vec<String>,
    pub researching: Option<String>,
    pub research_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: String,
    pub name: String,
    pub ships: u32,
    pub strength: u64,
    pub location: LocationRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Military {
    pub fleets: Vec<Fleet>,
    pub total_strength: u64,
    /// 0.0 ..= 1.0
    pub readiness: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    /// Listed in public views
    pub public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Allied,
    Friendly,
    Neutral,
    Wary,
    Hostile,
    AtWar,
}

impl Stance {
    pub fn is_threatening(self) -> bool {
        matches!(self, Self::Hostile | Self::AtWar)
    }
}

/// Diplomatic relation map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// The single stance this civilization declares to everyone
    pub public: Option<Stance>,
    /// Stance towards each known civilization
    pub with: BTreeMap<CivilizationId, Stance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureTrait {
    pub name: String,
    pub value: f32,
    /// Listed in public views
    pub visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Culture {
    pub values: Vec<String>,
    pub traits: Vec<CultureTrait>,
    pub government: String,
}

/// Goals and strategies, present only while AI-controlled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBehaviorState {
    pub profile: AiProfile,
    pub goals: Vec<String>,
    pub strategies: Vec<String>,
}

impl AiBehaviorState {
    pub fn from_profile(profile: AiProfile) -> Self {
        Self {
            profile,
            goals: to_strings(profile.personality.goals()),
            strategies: to_strings(profile.personality.strategies()),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub subject: CivilizationId,
    pub summary: String,
    pub tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretProject {
    pub name: String,
    /// 0.0 ..= 1.0
    pub progress: f32,
}

/// Canonical record for one civilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Civilization {
    pub id: CivilizationId,
    pub name: String,
    /// Current owning player (human or AI)
    pub owner: PlayerId,
    pub control: ControlMode,
    /// Inactive civilizations are kept but skipped by every phase
    pub active: bool,
    pub species: String,
    pub homeworld: LocationRef,
    pub population: u64,
    pub territory: BTreeSet<LocationRef>,
    pub resources: ResourceLedger,
    pub technology: Technology,
    pub policies: Vec<Policy>,
    pub military: Military,
    pub relations: Relations,
    pub treaties: Vec<String>,
    pub culture: Culture,
    pub ai_state: Option<AiBehaviorState>,
    pub intelligence: Vec<IntelligenceReport>,
    pub secret_projects: Vec<SecretProject>,
    pub founded_at: Tick,
}

impl Civilization {
    /// Bind to a human controller
    pub fn assign_human(&mut self, owner: PlayerId) {
        self.owner = owner;
        self.control = ControlMode::HumanControlled;
        self.ai_state = None;
        self.active = true;
    }

    /// Bind to an AI controller and initialize AI behavior state
    pub fn assign_ai(&mut self, owner: PlayerId, profile: AiProfile) {
        self.owner = owner;
        self.control = ControlMode::AiControlled;
        self.ai_state = Some(AiBehaviorState::from_profile(profile));
        self.active = true;
    }

    pub fn public_policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(|p| p.public)
    }

    pub fn visible_traits(&self) -> impl Iterator<Item = &CultureTrait> {
        self.culture.traits.iter().filter(|t| t.visible)
    }
}
