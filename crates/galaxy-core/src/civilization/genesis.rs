//! Deterministic founding of new civilizations.
//!
//! Everything random is drawn from a generator seeded by the world seed and
//! the civilization id, so the same id always founds the same civilization.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ids::{CivilizationId, LocationRef, PlayerId, Tick};
use crate::rng;

use super::{
    Civilization, ControlMode, Culture, CultureTrait, Fleet, Military, Relations, Resource,
    ResourceLedger, Stance, Technology,
};

const FOUNDING_STREAM: u64 = 1;

const STARS: [&str; 12] = [
    "vega", "altair", "rigel", "deneb", "sirius", "procyon", "kepler", "gliese", "tau-ceti",
    "arcturus", "polaris", "capella",
];

const VALUES: [&str; 8] = [
    "progress",
    "cooperation",
    "knowledge",
    "prosperity",
    "honor",
    "tradition",
    "freedom",
    "harmony",
];

const TRAITS: [&str; 6] = [
    "industrious",
    "diplomatic",
    "scientific",
    "militaristic",
    "mercantile",
    "spiritual",
];

/// Starting stockpiles for every new civilization
pub fn starting_resources() -> ResourceLedger {
    let mut ledger = ResourceLedger::default();
    ledger.set(Resource::Credits, 10_000);
    ledger.set(Resource::Minerals, 1_000);
    ledger.set(Resource::Energy, 500);
    ledger.set(Resource::Food, 800);
    ledger.set(Resource::Research, 100);
    ledger
}

/// What the founder asked for; everything unset is generated.
#[derive(Debug, Clone)]
pub struct FoundingRequest {
    pub id: CivilizationId,
    pub founder: PlayerId,
    pub founder_name: String,
    pub name: Option<String>,
    pub species: Option<String>,
    pub homeworld: Option<LocationRef>,
    pub government: Option<String>,
    pub tick: Tick,
}

impl FoundingRequest {
    pub fn new(id: CivilizationId, founder: PlayerId, founder_name: impl Into<String>) -> Self {
        Self {
            id,
            founder,
            founder_name: founder_name.into(),
            name: None,
            species: None,
            homeworld: None,
            government: None,
            tick: 0,
        }
    }
}

/// Seeded civilization generator.
#[derive(Debug, Clone, Copy)]
pub struct Genesis {
    seed: u64,
}

impl Genesis {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Found a civilization. The result is `Uncontrolled` until the caller
    /// binds its controller.
    pub fn found(&self, request: FoundingRequest, taken: &BTreeSet<LocationRef>) -> Civilization {
        let mut rng = rng::seeded(self.seed, request.id.as_str(), FOUNDING_STREAM);

        let homeworld = match request.homeworld {
            Some(homeworld) => homeworld,
            None => pick_homeworld(&mut rng, &request.id, taken),
        };

        let values = VALUES
            .choose_multiple(&mut rng, 4)
            .map(|v| (*v).to_owned())
            .collect();

        // Two public traits and one hidden, values in 0.40..=0.90
        let traits = TRAITS
            .choose_multiple(&mut rng, 3)
            .enumerate()
            .map(|(i, name)| CultureTrait {
                name: (*name).to_owned(),
                value: rng.gen_range(40..=90) as f32 / 100.0,
                visible: i < 2,
            })
            .collect::<Vec<_>>();

        Civilization {
            name: request
                .name
                .unwrap_or_else(|| format!("{}'s Civilization", request.founder_name)),
            id: request.id,
            owner: request.founder,
            control: ControlMode::Uncontrolled,
            active: true,
            species: request.species.unwrap_or_else(|| "human".to_owned()),
            population: 1_000_000,
            territory: BTreeSet::from([homeworld.clone()]),
            resources: starting_resources(),
            technology: Technology {
                level: 1,
                researched: vec![
                    "basic-agriculture".into(),
                    "basic-manufacturing".into(),
                    "basic-energy".into(),
                ],
                researching: None,
                research_points: 0,
            },
            policies: Vec::new(),
            military: Military {
                fleets: vec![Fleet {
                    id: "home-defense".into(),
                    name: "Home Defense Fleet".into(),
                    ships: 5,
                    strength: 100,
                    location: homeworld.clone(),
                }],
                total_strength: 100,
                readiness: 0.8,
            },
            relations: Relations {
                public: Some(Stance::Neutral),
                ..Relations::default()
            },
            treaties: Vec::new(),
            culture: Culture {
                values,
                traits,
                government: request.government.unwrap_or_else(|| "democracy".to_owned()),
            },
            ai_state: None,
            intelligence: Vec::new(),
            secret_projects: Vec::new(),
            founded_at: request.tick,
            homeworld,
        }
    }
}

fn pick_homeworld(
    rng: &mut impl Rng,
    id: &CivilizationId,
    taken: &BTreeSet<LocationRef>,
) -> LocationRef {
    for _ in 0..64 {
        let star = STARS[rng.gen_range(0..STARS.len())];
        let sector = rng.gen_range(1..=64);
        let planet = rng.gen_range(1..=9);
        let candidate = LocationRef::new(format!("{star}-{sector}/planet-{planet}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
    }

    let mut n = taken.len() + 1;
    loop {
        let candidate = LocationRef::new(format!("{id}-frontier/planet-{n}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
