//! State visibility gateway - read-side projection of civilization records.
//!
//! The gateway never mutates. A public or observer view is built field by
//! field from the record, so nothing private can leak into it by accident.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::civilization::{Civilization, CultureTrait, Stance};
use crate::ids::{CivilizationId, LocationRef};
use crate::player::{ControlType, Player};

/// What anyone may know about a civilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicView {
    pub id: CivilizationId,
    pub name: String,
    pub species: String,
    pub territory: BTreeSet<LocationRef>,
    pub public_policies: Vec<String>,
    pub diplomatic_stance: Option<Stance>,
    pub cultural_traits: Vec<CultureTrait>,
}

impl PublicView {
    pub fn of(civilization: &Civilization) -> Self {
        Self {
            id: civilization.id.clone(),
            name: civilization.name.clone(),
            species: civilization.species.clone(),
            territory: civilization.territory.clone(),
            public_policies: civilization
                .public_policies()
                .map(|p| p.name.clone())
                .collect(),
            diplomatic_stance: civilization.relations.public,
            cultural_traits: civilization.visible_traits().cloned().collect(),
        }
    }
}

/// The controller's own view: the whole record plus its attached systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullView {
    pub civilization: Civilization,
    pub systems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum CivilizationView {
    Full(FullView),
    /// Same breadth as public for now
    Observer(PublicView),
    Public(PublicView),
}

impl CivilizationView {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn public(&self) -> Option<&PublicView> {
        match self {
            Self::Full(_) => None,
            Self::Observer(view) | Self::Public(view) => Some(view),
        }
    }
}

pub struct VisibilityGateway;

impl VisibilityGateway {
    /// View of `civilization` permitted to `requester` (`None` is anonymous).
    pub fn view(
        civilization: &Civilization,
        requester: Option<&Player>,
        systems: &[String],
    ) -> CivilizationView {
        match requester {
            Some(player) if player.controls(&civilization.id) => CivilizationView::Full(FullView {
                civilization: civilization.clone(),
                systems: systems.to_vec(),
            }),
            Some(player) if player.control == ControlType::Observer => {
                CivilizationView::Observer(PublicView::of(civilization))
            }
            _ => CivilizationView::Public(PublicView::of(civilization)),
        }
    }
}
