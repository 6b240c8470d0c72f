//! Changes system units may request against a civilization record.
//!
//! Units never mutate records directly. They return change lists, and the
//! orchestrator applies each unit's list atomically once the phase settles.

use serde::{Deserialize, Serialize};

use crate::ids::{CivilizationId, LocationRef};

use super::{
    saturating_signed, Civilization, CultureTrait, IntelligenceReport, Policy, Resource,
    SecretProject, Stance,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum CivilizationChange {
    AdjustResource { resource: Resource, delta: i64 },
    AdjustPopulation { delta: i64 },
    ClaimTerritory { location: LocationRef },
    CedeTerritory { location: LocationRef },
    SetStance { other: CivilizationId, stance: Stance },
    SetPublicStance { stance: Stance },
    AdoptPolicy { policy: Policy },
    RepealPolicy { name: String },
    BeginResearch { technology: String },
    AddResearchPoints { points: u64 },
    CompleteResearch { technology: String },
    AdjustMilitary { strength: i64, readiness: Option<f32> },
    SignTreaty { treaty: String },
    RecordIntelligence { report: IntelligenceReport },
    AdvanceSecretProject { name: String, progress: f32 },
    SetCultureTrait { culture_trait: CultureTrait },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChangeError {
    #[error("cannot cede {0}: territory may not become empty")]
    LastTerritory(LocationRef),
    #[error("{0} is not part of this civilization's territory")]
    NotOwned(LocationRef),
    #[error("a civilization cannot hold a stance towards itself")]
    SelfRelation,
    #[error("unknown civilization {0}")]
    UnknownTarget(CivilizationId),
    #[error("civilization {0} is not active")]
    InactiveTarget(CivilizationId),
}

impl Civilization {
    /// Apply a single change in place.
    pub fn apply(&mut self, change: &CivilizationChange) -> Result<(), ChangeError> {
        match change {
            CivilizationChange::AdjustResource { resource, delta } => {
                self.resources.adjust(*resource, *delta);
            }
            CivilizationChange::AdjustPopulation { delta } => {
                self.population = saturating_signed(self.population, *delta);
            }
            CivilizationChange::ClaimTerritory { location } => {
                self.territory.insert(location.clone());
            }
            CivilizationChange::CedeTerritory { location } => {
                if !self.territory.contains(location) {
                    return Err(ChangeError::NotOwned(location.clone()));
                }
                if self.territory.len() == 1 {
                    return Err(ChangeError::LastTerritory(location.clone()));
                }
                self.territory.remove(location);
            }
            CivilizationChange::SetStance { other, stance } => {
                if *other == self.id {
                    return Err(ChangeError::SelfRelation);
                }
                self.relations.with.insert(other.clone(), *stance);
            }
            CivilizationChange::SetPublicStance { stance } => {
                self.relations.public = Some(*stance);
            }
            CivilizationChange::AdoptPolicy { policy } => {
                self.policies.retain(|p| p.name != policy.name);
                self.policies.push(policy.clone());
            }
            CivilizationChange::RepealPolicy { name } => {
                self.policies.retain(|p| &p.name != name);
            }
            CivilizationChange::BeginResearch { technology } => {
                self.technology.researching = Some(technology.clone());
            }
            CivilizationChange::AddResearchPoints { points } => {
                self.technology.research_points =
                    self.technology.research_points.saturating_add(*points);
            }
            CivilizationChange::CompleteResearch { technology } => {
                if !self.technology.researched.contains(technology) {
                    self.technology.researched.push(technology.clone());
                    self.technology.level += 1;
                }
                if self.technology.researching.as_ref() == Some(technology) {
                    self.technology.researching = None;
                }
                self.technology.research_points = 0;
            }
            CivilizationChange::AdjustMilitary { strength, readiness } => {
                self.military.total_strength =
                    saturating_signed(self.military.total_strength, *strength);
                if let Some(readiness) = readiness {
                    self.military.readiness = readiness.clamp(0.0, 1.0);
                }
            }
            CivilizationChange::SignTreaty { treaty } => {
                if !self.treaties.contains(treaty) {
                    self.treaties.push(treaty.clone());
                }
            }
            CivilizationChange::RecordIntelligence { report } => {
                self.intelligence.push(report.clone());
            }
            CivilizationChange::AdvanceSecretProject { name, progress } => {
                match self.secret_projects.iter_mut().find(|p| &p.name == name) {
                    Some(project) => {
                        project.progress = (project.progress + progress).clamp(0.0, 1.0);
                    }
                    None => self.secret_projects.push(SecretProject {
                        name: name.clone(),
                        progress: progress.clamp(0.0, 1.0),
                    }),
                }
            }
            CivilizationChange::SetCultureTrait { culture_trait } => {
                match self
                    .culture
                    .traits
                    .iter_mut()
                    .find(|t| t.name == culture_trait.name)
                {
                    Some(existing) => *existing = culture_trait.clone(),
                    None => self.culture.traits.push(culture_trait.clone()),
                }
            }
        }
        Ok(())
    }

    /// Apply all changes or none of them.
    pub fn apply_all(&mut self, changes: &[CivilizationChange]) -> Result<(), ChangeError> {
        let mut staged = self.clone();
        for change in changes {
            staged.apply(change)?;
        }
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::civilization::{FoundingRequest, Genesis};
    use crate::ids::PlayerId;

    fn civ() -> Civilization {
        Genesis::new(1).found(
            FoundingRequest::new(CivilizationId::from("solace"), PlayerId::from("p1"), "Ada"),
            &BTreeSet::new(),
        )
    }

    #[test]
    fn apply_all_is_atomic() {
        let mut civ = civ();
        let before = civ.clone();
        let home = civ.homeworld.clone();

        let result = civ.apply_all(&[
            CivilizationChange::AdjustResource {
                resource: Resource::Credits,
                delta: 500,
            },
            CivilizationChange::CedeTerritory { location: home },
        ]);

        assert!(matches!(result, Err(ChangeError::LastTerritory(_))));
        assert_eq!(civ, before);
    }

    #[test]
    fn research_completion_levels_up() {
        let mut civ = civ();
        let level = civ.technology.level;

        civ.apply_all(&[
            CivilizationChange::BeginResearch {
                technology: "warp-theory".into(),
            },
            CivilizationChange::AddResearchPoints { points: 40 },
            CivilizationChange::CompleteResearch {
                technology: "warp-theory".into(),
            },
        ])
        .unwrap();

        assert_eq!(civ.technology.level, level + 1);
        assert!(civ.technology.researching.is_none());
        assert_eq!(civ.technology.research_points, 0);
    }

    #[test]
    fn stance_towards_self_is_rejected() {
        let mut civ = civ();
        let id = civ.id.clone();
        assert_eq!(
            civ.apply(&CivilizationChange::SetStance {
                other: id,
                stance: Stance::Allied
            }),
            Err(ChangeError::SelfRelation)
        );
    }
}
