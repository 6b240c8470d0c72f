//! Typed unit catalog: domain enums mapped to factories.
//!
//! The catalog is filled before the engine starts. Domains without a factory
//! are reported once as not available and skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai::AiModule;
use crate::civilization::Civilization;

use super::{BackgroundUnit, CivilizationUnit, InteractionUnit, SharedUnit};

macro_rules! domain {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

domain!(
    /// Galaxy-wide systems (phase 1)
    SharedDomain {
        GalaxyMap => "galaxy_map",
        UniversalMarkets => "universal_markets",
        Environmental => "environmental",
        CosmicEvents => "cosmic_events",
    }
);

domain!(
    /// Per-civilization systems (phase 2)
    CivilizationDomain {
        Population => "population",
        Economy => "economy",
        Military => "military",
        Research => "research",
        Diplomacy => "diplomacy",
    }
);

domain!(
    /// Cross-civilization systems (phase 3)
    InteractionDomain {
        Diplomacy => "diplomacy",
        Trade => "trade",
        Warfare => "warfare",
        CulturalExchange => "cultural_exchange",
    }
);

domain!(
    /// Player-agnostic systems (phase 4)
    BackgroundDomain {
        MinorCivilizations => "minor_civilizations",
        NaturalEvolution => "natural_evolution",
        RandomEvents => "random_events",
    }
);

domain!(
    /// AI decision modules (phase 5)
    AiDomain {
        Psychology => "psychology",
        Financial => "financial",
        Cultural => "cultural",
        Political => "political",
        Military => "military",
    }
);

type GlobalFactory<U> = Arc<dyn Fn() -> U + Send + Sync>;
type ScopedFactory<U> = Arc<dyn Fn(&Civilization) -> U + Send + Sync>;

#[derive(Default, Clone)]
pub struct UnitCatalog {
    shared: BTreeMap<SharedDomain, GlobalFactory<SharedUnit>>,
    civilization: BTreeMap<CivilizationDomain, ScopedFactory<CivilizationUnit>>,
    interaction: BTreeMap<InteractionDomain, GlobalFactory<InteractionUnit>>,
    background: BTreeMap<BackgroundDomain, GlobalFactory<BackgroundUnit>>,
    ai: BTreeMap<AiDomain, ScopedFactory<Box<dyn AiModule>>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared<F>(mut self, domain: SharedDomain, factory: F) -> Self
    where
        F: Fn() -> SharedUnit + Send + Sync + 'static,
    {
        self.shared.insert(domain, Arc::new(factory));
        self
    }

    pub fn civilization<F>(mut self, domain: CivilizationDomain, factory: F) -> Self
    where
        F: Fn(&Civilization) -> CivilizationUnit + Send + Sync + 'static,
    {
        self.civilization.insert(domain, Arc::new(factory));
        self
    }

    pub fn interaction<F>(mut self, domain: InteractionDomain, factory: F) -> Self
    where
        F: Fn() -> InteractionUnit + Send + Sync + 'static,
    {
        self.interaction.insert(domain, Arc::new(factory));
        self
    }

    pub fn background<F>(mut self, domain: BackgroundDomain, factory: F) -> Self
    where
        F: Fn() -> BackgroundUnit + Send + Sync + 'static,
    {
        self.background.insert(domain, Arc::new(factory));
        self
    }

    pub fn ai<F>(mut self, domain: AiDomain, factory: F) -> Self
    where
        F: Fn(&Civilization) -> Box<dyn AiModule> + Send + Sync + 'static,
    {
        self.ai.insert(domain, Arc::new(factory));
        self
    }

    /// Warn about every domain nothing is registered for
    pub fn report_missing(&self) -> usize {
        let mut missing = 0;
        let mut note = |scope: &str, domain: &str| {
            warn!(scope, domain, "system not available");
            missing += 1;
        };

        for d in SharedDomain::ALL.iter().filter(|d| !self.shared.contains_key(*d)) {
            note("shared", d.as_str());
        }
        for d in CivilizationDomain::ALL
            .iter()
            .filter(|d| !self.civilization.contains_key(*d))
        {
            note("civilization", d.as_str());
        }
        for d in InteractionDomain::ALL
            .iter()
            .filter(|d| !self.interaction.contains_key(*d))
        {
            note("interaction", d.as_str());
        }
        for d in BackgroundDomain::ALL
            .iter()
            .filter(|d| !self.background.contains_key(*d))
        {
            note("background", d.as_str());
        }
        for d in AiDomain::ALL.iter().filter(|d| !self.ai.contains_key(*d)) {
            note("ai", d.as_str());
        }
        missing
    }

    pub fn shared_units(&self) -> Vec<SharedUnit> {
        self.shared.values().map(|f| f()).collect()
    }

    pub fn civilization_units(&self, civilization: &Civilization) -> Vec<CivilizationUnit> {
        self.civilization.values().map(|f| f(civilization)).collect()
    }

    pub fn interaction_units(&self) -> Vec<InteractionUnit> {
        self.interaction.values().map(|f| f()).collect()
    }

    pub fn background_units(&self) -> Vec<BackgroundUnit> {
        self.background.values().map(|f| f()).collect()
    }

    pub fn ai_modules(&self, civilization: &Civilization) -> Vec<Box<dyn AiModule>> {
        self.ai.values().map(|f| f(civilization)).collect()
    }
}

impl fmt::Debug for UnitCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitCatalog")
            .field("shared", &self.shared.keys().collect::<Vec<_>>())
            .field("civilization", &self.civilization.keys().collect::<Vec<_>>())
            .field("interaction", &self.interaction.keys().collect::<Vec<_>>())
            .field("background", &self.background.keys().collect::<Vec<_>>())
            .field("ai", &self.ai.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::advisors::FinancialAdvisor;
    use crate::units::builtin::GalaxyClock;

    #[test]
    fn missing_domains_are_counted() {
        let catalog = UnitCatalog::new()
            .shared(SharedDomain::GalaxyMap, || Box::new(GalaxyClock::default()))
            .ai(AiDomain::Financial, |_| Box::new(FinancialAdvisor));

        let total = SharedDomain::ALL.len()
            + CivilizationDomain::ALL.len()
            + InteractionDomain::ALL.len()
            + BackgroundDomain::ALL.len()
            + AiDomain::ALL.len();
        assert_eq!(catalog.report_missing(), total - 2);
        assert_eq!(catalog.shared_units().len(), 1);
        assert!(catalog.interaction_units().is_empty());
    }

    #[test]
    fn domains_use_snake_case_labels() {
        assert_eq!(InteractionDomain::CulturalExchange.as_str(), "cultural_exchange");
        assert_eq!(
            serde_json::to_value(BackgroundDomain::MinorCivilizations).unwrap(),
            "minor_civilizations"
        );
    }
}
