//! Civilization registry - single source of truth for civilization state.
//!
//! Records are created on first join and never deleted, only deactivated.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::EngineError;
use crate::ids::{CivilizationId, LocationRef};

use super::{ChangeError, Civilization, CivilizationChange};

#[derive(Debug, Default)]
pub struct CivilizationRegistry {
    records: BTreeMap<CivilizationId, Civilization>,
}

impl CivilizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, civilization: Civilization) -> Result<(), EngineError> {
        if let Some(existing) = self.records.get(&civilization.id) {
            return Err(EngineError::DuplicateCivilization {
                civilization: existing.id.clone(),
                controller: existing.owner.clone(),
            });
        }
        self.records.insert(civilization.id.clone(), civilization);
        Ok(())
    }

    pub fn get(&self, id: &CivilizationId) -> Option<&Civilization> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &CivilizationId) -> Option<&mut Civilization> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &CivilizationId) -> bool {
        self.records.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Civilization> {
        self.records.values()
    }

    pub fn active(&self) -> impl Iterator<Item = &Civilization> {
        self.records.values().filter(|c| c.active)
    }

    pub fn active_ids(&self) -> Vec<CivilizationId> {
        self.active().map(|c| c.id.clone()).collect()
    }

    /// Copy of every active record, for phase snapshots
    pub fn snapshot_active(&self) -> BTreeMap<CivilizationId, Civilization> {
        self.active().map(|c| (c.id.clone(), c.clone())).collect()
    }

    pub fn homeworlds(&self) -> BTreeSet<LocationRef> {
        self.records.values().map(|c| c.homeworld.clone()).collect()
    }

    /// Mark a civilization inactive; the record stays
    pub fn deactivate(&mut self, id: &CivilizationId) -> bool {
        match self.records.get_mut(id) {
            Some(civ) if civ.active => {
                civ.active = false;
                civ.ai_state = None;
                true
            }
            _ => false,
        }
    }

    /// Apply one civilization's change list atomically.
    pub fn apply(
        &mut self,
        id: &CivilizationId,
        changes: &[CivilizationChange],
    ) -> Result<(), ChangeError> {
        self.check_targets(changes.iter())?;
        let civ = self.live_mut(id)?;
        civ.apply_all(changes)
    }

    /// Apply changes addressed to several civilizations; all or nothing.
    pub fn apply_many(
        &mut self,
        changes: &[(CivilizationId, CivilizationChange)],
    ) -> Result<(), ChangeError> {
        self.check_targets(changes.iter().map(|(_, c)| c))?;

        let mut staged: BTreeMap<CivilizationId, Civilization> = BTreeMap::new();
        for (id, change) in changes {
            if !staged.contains_key(id) {
                let live = self.live(id)?.clone();
                staged.insert(id.clone(), live);
            }
            if let Some(civ) = staged.get_mut(id) {
                civ.apply(change)?;
            }
        }

        for (id, civ) in staged {
            self.records.insert(id, civ);
        }
        Ok(())
    }

    fn live(&self, id: &CivilizationId) -> Result<&Civilization, ChangeError> {
        match self.records.get(id) {
            Some(civ) if civ.active => Ok(civ),
            Some(_) => Err(ChangeError::InactiveTarget(id.clone())),
            None => Err(ChangeError::UnknownTarget(id.clone())),
        }
    }

    fn live_mut(&mut self, id: &CivilizationId) -> Result<&mut Civilization, ChangeError> {
        match self.records.get_mut(id) {
            Some(civ) if civ.active => Ok(civ),
            Some(_) => Err(ChangeError::InactiveTarget(id.clone())),
            None => Err(ChangeError::UnknownTarget(id.clone())),
        }
    }

    /// Stances may only point at known civilizations.
    fn check_targets<'a>(
        &self,
        changes: impl Iterator<Item = &'a CivilizationChange>,
    ) -> Result<(), ChangeError> {
        for change in changes {
            if let CivilizationChange::SetStance { other, .. } = change {
                if !self.records.contains_key(other) {
                    return Err(ChangeError::UnknownTarget(other.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civilization::{FoundingRequest, Genesis, Resource, Stance};
    use crate::ids::PlayerId;

    fn registry_with(ids: &[&str]) -> CivilizationRegistry {
        let genesis = Genesis::new(3);
        let mut registry = CivilizationRegistry::new();
        for id in ids {
            let mut civ = genesis.found(
                FoundingRequest::new(CivilizationId::from(*id), PlayerId::from(*id), *id),
                &registry.homeworlds(),
            );
            civ.assign_human(PlayerId::from(*id));
            registry.insert(civ).unwrap();
        }
        registry
    }

    #[test]
    fn apply_many_rolls_back_every_record() {
        let mut registry = registry_with(&["a", "b"]);
        let a = CivilizationId::from("a");
        let b = CivilizationId::from("b");
        let b_home = registry.get(&b).unwrap().homeworld.clone();

        let result = registry.apply_many(&[
            (
                a.clone(),
                CivilizationChange::AdjustResource {
                    resource: Resource::Credits,
                    delta: 1,
                },
            ),
            (b.clone(), CivilizationChange::CedeTerritory { location: b_home }),
        ]);

        assert!(result.is_err());
        assert_eq!(registry.get(&a).unwrap().resources.get(Resource::Credits), 10_000);
    }

    #[test]
    fn stance_towards_unknown_civilization_is_rejected() {
        let mut registry = registry_with(&["a"]);
        let result = registry.apply(
            &CivilizationId::from("a"),
            &[CivilizationChange::SetStance {
                other: CivilizationId::from("ghost"),
                stance: Stance::Hostile,
            }],
        );
        assert_eq!(
            result,
            Err(ChangeError::UnknownTarget(CivilizationId::from("ghost")))
        );
    }

    #[test]
    fn deactivated_records_are_kept_but_frozen() {
        let mut registry = registry_with(&["a", "b"]);
        let a = CivilizationId::from("a");

        assert!(registry.deactivate(&a));
        assert!(!registry.deactivate(&a));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_ids(), vec![CivilizationId::from("b")]);
        assert!(matches!(
            registry.apply(&a, &[]),
            Err(ChangeError::InactiveTarget(_))
        ));
    }

    #[test]
    fn duplicate_insert_reports_controller() {
        let mut registry = registry_with(&["a"]);
        let copy = registry.get(&CivilizationId::from("a")).unwrap().clone();
        assert!(matches!(
            registry.insert(copy),
            Err(EngineError::DuplicateCivilization { .. })
        ));
    }
}
