//! Reference system units.
//!
//! Small, deterministic implementations for the binary and tests. They keep
//! the galaxy moving; balance is not their concern.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::action::Action;
use crate::civilization::{CivilizationChange, Policy, Resource, Stance};
use crate::ids::{CivilizationId, Tick};
use crate::rng;
use crate::shared::SharedChange;

use crate::ai::advisors::{FinancialAdvisor, MilitaryAdvisor};

use super::{
    AiDomain, BackgroundContext, BackgroundDomain, CivilizationContext, CivilizationDomain,
    CivilizationOutput, InteractionContext, InteractionDomain, InteractionOutput, SharedContext,
    SharedDomain, SharedOutput, SystemUnit, UnitCatalog, UnitEvent,
};

/// Catalog wired with every reference unit and advisor.
pub fn reference_catalog(seed: u64) -> UnitCatalog {
    UnitCatalog::new()
        .shared(SharedDomain::GalaxyMap, || Box::new(GalaxyClock::default()))
        .civilization(CivilizationDomain::Economy, |_| Box::new(EconomyIncome))
        .civilization(CivilizationDomain::Military, |_| Box::new(MilitaryCommand))
        .civilization(CivilizationDomain::Research, |_| Box::new(ResearchProgress))
        .interaction(InteractionDomain::Trade, || Box::new(TradeExchange::default()))
        .interaction(InteractionDomain::Diplomacy, || Box::new(DiplomacyDesk))
        .background(BackgroundDomain::RandomEvents, move || {
            Box::new(RandomEvents::new(seed, 0.05))
        })
        .ai(AiDomain::Financial, |_| Box::new(FinancialAdvisor))
        .ai(AiDomain::Military, |_| Box::new(MilitaryAdvisor))
}

fn payload<T: for<'de> Deserialize<'de>>(unit: &str, action: &Action) -> Option<T> {
    match serde_json::from_value(action.payload.clone()) {
        Ok(order) => Some(order),
        Err(err) => {
            debug!(unit, action = action.id, kind = %action.kind, error = %err, "ignoring malformed action");
            None
        }
    }
}

/// Advances the galactic calendar one day per tick.
#[derive(Debug)]
pub struct GalaxyClock {
    size: u32,
}

impl GalaxyClock {
    pub fn new(size: u32) -> Self {
        Self { size }
    }
}

impl Default for GalaxyClock {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl SystemUnit<SharedContext> for GalaxyClock {
    fn name(&self) -> &str {
        "galaxy_clock"
    }

    async fn process_tick(&mut self, _tick: Tick, context: &SharedContext) -> anyhow::Result<SharedOutput> {
        let mut changes = vec![SharedChange::AdvanceDays { days: 1 }];
        if context.shared.galaxy_size.is_none() {
            changes.push(SharedChange::SetGalaxySize { size: self.size });
        }
        Ok(SharedOutput {
            changes,
            events: Vec::new(),
        })
    }
}

#[derive(Deserialize)]
struct PolicyOrder {
    name: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    repeal: bool,
}

/// Per-world income, food upkeep and policy orders.
#[derive(Debug, Default)]
pub struct EconomyIncome;

#[async_trait]
impl SystemUnit<CivilizationContext> for EconomyIncome {
    fn name(&self) -> &str {
        "economy"
    }

    fn claims(&self) -> &[&'static str] {
        &["policy"]
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        let civ = &context.civilization;
        let worlds = civ.territory.len() as i64;
        let upkeep = (civ.population / 250_000) as i64;

        let mut changes = vec![
            CivilizationChange::AdjustResource {
                resource: Resource::Credits,
                delta: 10 * worlds,
            },
            CivilizationChange::AdjustResource {
                resource: Resource::Minerals,
                delta: 5 * worlds,
            },
            CivilizationChange::AdjustResource {
                resource: Resource::Energy,
                delta: 3 * worlds,
            },
            CivilizationChange::AdjustResource {
                resource: Resource::Food,
                delta: 4 * worlds - upkeep,
            },
        ];

        for order in context
            .actions
            .iter()
            .filter_map(|a| payload::<PolicyOrder>(self.name(), a))
        {
            changes.push(if order.repeal {
                CivilizationChange::RepealPolicy { name: order.name }
            } else {
                CivilizationChange::AdoptPolicy {
                    policy: Policy {
                        name: order.name,
                        public: order.public,
                    },
                }
            });
        }

        Ok(CivilizationOutput {
            changes,
            events: Vec::new(),
        })
    }
}

#[derive(Deserialize)]
struct MilitaryOrder {
    strength: i64,
    #[serde(default)]
    readiness: Option<f32>,
}

/// Applies force build-up and stand-down orders.
#[derive(Debug, Default)]
pub struct MilitaryCommand;

const CREDITS_PER_STRENGTH: i64 = 10;

#[async_trait]
impl SystemUnit<CivilizationContext> for MilitaryCommand {
    fn name(&self) -> &str {
        "military"
    }

    fn claims(&self) -> &[&'static str] {
        &["military"]
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        let mut output = CivilizationOutput::default();
        let mut treasury = context.civilization.resources.get(Resource::Credits);
        for order in context
            .actions
            .iter()
            .filter_map(|a| payload::<MilitaryOrder>(self.name(), a))
        {
            let cost = order.strength.max(0).checked_mul(CREDITS_PER_STRENGTH);
            let Some(cost) = cost.filter(|c| c.unsigned_abs() <= treasury) else {
                debug!(civilization = %context.civilization.id, strength = order.strength, "military order not affordable; skipped");
                continue;
            };
            treasury -= cost.unsigned_abs();
            output.changes.push(CivilizationChange::AdjustMilitary {
                strength: order.strength,
                readiness: order.readiness,
            });
            if cost > 0 {
                output.changes.push(CivilizationChange::AdjustResource {
                    resource: Resource::Credits,
                    delta: -cost,
                });
            }
        }
        Ok(output)
    }
}

#[derive(Deserialize)]
struct ResearchOrder {
    technology: String,
}

/// Accumulates research points towards the current project.
#[derive(Debug, Default)]
pub struct ResearchProgress;

#[async_trait]
impl SystemUnit<CivilizationContext> for ResearchProgress {
    fn name(&self) -> &str {
        "research"
    }

    fn claims(&self) -> &[&'static str] {
        &["research"]
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &CivilizationContext,
    ) -> anyhow::Result<CivilizationOutput> {
        let tech = &context.civilization.technology;
        let mut output = CivilizationOutput::default();

        // Last order wins.
        let ordered = context
            .actions
            .iter()
            .filter_map(|a| payload::<ResearchOrder>(self.name(), a))
            .last()
            .map(|o| o.technology);
        if let Some(technology) = &ordered {
            output.changes.push(CivilizationChange::BeginResearch {
                technology: technology.clone(),
            });
        }

        let Some(current) = ordered.or_else(|| tech.researching.clone()) else {
            return Ok(output);
        };

        let gained = 5 + 5 * u64::from(tech.level);
        let needed = 100 * u64::from(tech.level.max(1));
        if tech.research_points + gained >= needed {
            output.events.push(UnitEvent::new(
                "research_completed",
                json!({ "technology": current }),
            ));
            output
                .changes
                .push(CivilizationChange::CompleteResearch { technology: current });
        } else {
            output
                .changes
                .push(CivilizationChange::AddResearchPoints { points: gained });
        }
        Ok(output)
    }
}

#[derive(Deserialize)]
struct TradeOrder {
    partner: CivilizationId,
    resource: Resource,
    amount: u64,
}

/// Swaps goods for credits between two civilizations.
#[derive(Debug)]
pub struct TradeExchange {
    credits_per_unit: u64,
}

impl Default for TradeExchange {
    fn default() -> Self {
        Self { credits_per_unit: 2 }
    }
}

#[async_trait]
impl SystemUnit<InteractionContext> for TradeExchange {
    fn name(&self) -> &str {
        "trade"
    }

    fn claims(&self) -> &[&'static str] {
        &["trade"]
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &InteractionContext,
    ) -> anyhow::Result<InteractionOutput> {
        let mut output = InteractionOutput::default();
        // Running balances so orders within one tick cannot spend the same stock twice
        let mut balances: BTreeMap<(CivilizationId, Resource), u64> = BTreeMap::new();

        for action in &context.actions {
            let Some(order) = payload::<TradeOrder>(self.name(), action) else {
                continue;
            };
            let Some(seller) = action
                .civilization
                .as_ref()
                .and_then(|id| context.civilizations.get(id))
            else {
                continue;
            };
            let Some(buyer) = context.civilizations.get(&order.partner) else {
                continue;
            };
            let price = order.amount.saturating_mul(self.credits_per_unit);
            let (Ok(amount), Ok(cost)) = (i64::try_from(order.amount), i64::try_from(price)) else {
                debug!(unit = self.name(), action = action.id, "trade order too large; skipped");
                continue;
            };
            if seller.id == buyer.id || order.resource == Resource::Credits {
                continue;
            }

            let stock = *balances
                .entry((seller.id.clone(), order.resource))
                .or_insert_with(|| seller.resources.get(order.resource));
            let funds = *balances
                .entry((buyer.id.clone(), Resource::Credits))
                .or_insert_with(|| buyer.resources.get(Resource::Credits));
            if stock < order.amount || funds < price {
                debug!(seller = %seller.id, buyer = %buyer.id, "trade order not covered; skipped");
                continue;
            }
            balances.insert((seller.id.clone(), order.resource), stock - order.amount);
            balances.insert((buyer.id.clone(), Resource::Credits), funds - price);
            let earned = balances
                .entry((seller.id.clone(), Resource::Credits))
                .or_insert_with(|| seller.resources.get(Resource::Credits));
            *earned = earned.saturating_add(price);
            let received = balances
                .entry((buyer.id.clone(), order.resource))
                .or_insert_with(|| buyer.resources.get(order.resource));
            *received = received.saturating_add(order.amount);

            output.changes.extend([
                (
                    seller.id.clone(),
                    CivilizationChange::AdjustResource {
                        resource: order.resource,
                        delta: -amount,
                    },
                ),
                (
                    buyer.id.clone(),
                    CivilizationChange::AdjustResource {
                        resource: order.resource,
                        delta: amount,
                    },
                ),
                (
                    buyer.id.clone(),
                    CivilizationChange::AdjustResource {
                        resource: Resource::Credits,
                        delta: -cost,
                    },
                ),
                (
                    seller.id.clone(),
                    CivilizationChange::AdjustResource {
                        resource: Resource::Credits,
                        delta: cost,
                    },
                ),
            ]);
            output.events.push(UnitEvent::new(
                "trade_completed",
                json!({
                    "seller": seller.id,
                    "buyer": buyer.id,
                    "resource": order.resource,
                    "amount": order.amount,
                }),
            ));
        }
        Ok(output)
    }
}

#[derive(Deserialize)]
struct DiplomacyOrder {
    #[serde(default)]
    target: Option<CivilizationId>,
    stance: Stance,
}

/// Stance changes. Alliances are mutual; everything else is one-sided.
#[derive(Debug, Default)]
pub struct DiplomacyDesk;

#[async_trait]
impl SystemUnit<InteractionContext> for DiplomacyDesk {
    fn name(&self) -> &str {
        "diplomacy"
    }

    fn claims(&self) -> &[&'static str] {
        &["diplomacy"]
    }

    async fn process_tick(
        &mut self,
        _tick: Tick,
        context: &InteractionContext,
    ) -> anyhow::Result<InteractionOutput> {
        let mut output = InteractionOutput::default();

        for action in &context.actions {
            let Some(order) = payload::<DiplomacyOrder>(self.name(), action) else {
                continue;
            };
            let Some(origin) = action.civilization.clone() else {
                continue;
            };

            match order.target {
                None => output.changes.push((
                    origin,
                    CivilizationChange::SetPublicStance {
                        stance: order.stance,
                    },
                )),
                Some(target) if context.civilizations.contains_key(&target) && target != origin => {
                    if order.stance == Stance::Allied {
                        output.changes.push((
                            target.clone(),
                            CivilizationChange::SetStance {
                                other: origin.clone(),
                                stance: Stance::Allied,
                            },
                        ));
                    }
                    output.changes.push((
                        origin,
                        CivilizationChange::SetStance {
                            other: target,
                            stance: order.stance,
                        },
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(output)
    }
}

/// Occasional cosmic happenings near a random civilization.
#[derive(Debug)]
pub struct RandomEvents {
    seed: u64,
    /// Chance per tick, 0.0 ..= 1.0
    chance: f64,
}

impl RandomEvents {
    pub fn new(seed: u64, chance: f64) -> Self {
        Self {
            seed,
            chance: chance.clamp(0.0, 1.0),
        }
    }
}

const ANOMALIES: &[&str] = &["ion_storm", "derelict_found", "solar_flare", "wormhole_flicker"];

#[async_trait]
impl SystemUnit<BackgroundContext> for RandomEvents {
    fn name(&self) -> &str {
        "random_events"
    }

    async fn process_tick(&mut self, tick: Tick, context: &BackgroundContext) -> anyhow::Result<SharedOutput> {
        let mut rng = rng::seeded(self.seed, self.name(), tick);
        let mut output = SharedOutput::default();

        if !rng.gen_bool(self.chance) {
            return Ok(output);
        }
        let (Some(near), Some(kind)) = (
            context.civilizations.choose(&mut rng),
            ANOMALIES.choose(&mut rng),
        ) else {
            return Ok(output);
        };

        let record = json!({ "kind": kind, "near": near.id, "tick": tick });
        output.changes.push(SharedChange::Set {
            key: "random_events".into(),
            value: record.clone(),
        });
        output.events.push(UnitEvent::new("cosmic_anomaly", record));
        Ok(output)
    }
}
