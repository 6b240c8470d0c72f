use crate::civilization::CivilizationRegistry;
use crate::error::{EngineError, ValidationError};
use crate::ids::{CivilizationId, PlayerId};
use crate::player::PlayerRegistry;

use super::{Action, ActionOrigin, ActionRequest};

/// Check a player's submission, returning the civilization it binds to.
///
/// Order: the player exists, the kind is well formed, a person is
/// connected, the capability set permits the kind, and a civilization is
/// bound when one is required.
pub fn validate(
    players: &PlayerRegistry,
    civilizations: &CivilizationRegistry,
    player_id: &PlayerId,
    request: &ActionRequest,
) -> Result<Option<CivilizationId>, EngineError> {
    let player = players
        .get(player_id)
        .ok_or_else(|| EngineError::UnknownPlayer(player_id.clone()))?;

    if request.kind.trim().is_empty() {
        return Err(ValidationError::EmptyActionType.into());
    }

    let person = player.control.is_person() || player.takeover.is_some();
    if person && !player.connected {
        return Err(ValidationError::Disconnected(player.id.clone()).into());
    }

    if !player.capabilities.permits(&request.kind) {
        return Err(ValidationError::MissingCapability {
            player: player.id.clone(),
            action: request.kind.clone(),
        }
        .into());
    }

    let bound = player
        .civilization
        .as_ref()
        .and_then(|id| civilizations.get(id));

    match bound {
        Some(civ) if civ.active => Ok(Some(civ.id.clone())),
        Some(civ) if request.requires_civilization => {
            Err(ValidationError::InactiveCivilization(civ.id.clone()).into())
        }
        None if request.requires_civilization => {
            Err(ValidationError::NoCivilization(player.id.clone()).into())
        }
        _ => Ok(None),
    }
}

/// Re-check a queued action against the state at claim time.
///
/// The submitter must still exist, still control the civilization the
/// action was bound to (which must still be active) and still hold the
/// capability. AI decisions also need the submitter to still run AI.
pub fn revalidate(
    players: &PlayerRegistry,
    civilizations: &CivilizationRegistry,
    action: &Action,
) -> Result<(), EngineError> {
    let player = players
        .get(&action.player)
        .ok_or_else(|| EngineError::UnknownPlayer(action.player.clone()))?;

    if let Some(civ_id) = &action.civilization {
        if !player.controls(civ_id) {
            return Err(ValidationError::ControlChanged(player.id.clone()).into());
        }
        if !civilizations.get(civ_id).is_some_and(|c| c.active) {
            return Err(ValidationError::InactiveCivilization(civ_id.clone()).into());
        }
    }

    if matches!(action.origin, ActionOrigin::Ai { .. }) && !player.control.runs_ai() {
        return Err(ValidationError::ControlChanged(player.id.clone()).into());
    }

    if !player.capabilities.permits(&action.kind) {
        return Err(ValidationError::MissingCapability {
            player: player.id.clone(),
            action: action.kind.clone(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civilization::{FoundingRequest, Genesis};
    use crate::player::{Capabilities, ControlType, Player};

    fn player(id: &str, control: ControlType, civ: Option<&str>) -> Player {
        Player {
            id: PlayerId::from(id),
            name: id.into(),
            control,
            civilization: civ.map(CivilizationId::from),
            session: None,
            connected: true,
            capabilities: Capabilities::defaults_for(control),
            ai: None,
            joined_at: 0,
            last_activity: 0,
            disconnected_at: None,
            takeover: None,
            synthetic: false,
        }
    }

    fn world() -> (PlayerRegistry, CivilizationRegistry) {
        let mut players = PlayerRegistry::new();
        players
            .insert(player("p1", ControlType::Human, Some("solace")))
            .unwrap();
        players
            .insert(player("hal", ControlType::Ai, Some("orion")))
            .unwrap();

        let genesis = Genesis::new(5);
        let mut civs = CivilizationRegistry::default();
        for (civ, owner) in [("solace", "p1"), ("orion", "hal")] {
            let founded = genesis.found(
                FoundingRequest::new(civ.into(), PlayerId::from(owner), owner),
                &civs.homeworlds(),
            );
            civs.insert(founded).unwrap();
        }
        (players, civs)
    }

    fn queued(player: &str, civ: &str, kind: &str, origin: ActionOrigin) -> Action {
        Action::new(
            ActionRequest::new(kind),
            PlayerId::from(player),
            Some(CivilizationId::from(civ)),
            0,
            origin,
        )
    }

    #[test]
    fn unknown_player_is_reported_before_malformed_kind() {
        let (players, civs) = world();
        let err = validate(&players, &civs, &PlayerId::from("ghost"), &ActionRequest::new(""))
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownPlayer(PlayerId::from("ghost")));

        let err = validate(&players, &civs, &PlayerId::from("p1"), &ActionRequest::new(" "))
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyActionType.into());
    }

    #[test]
    fn queued_actions_stay_valid_while_nothing_changes() {
        let (players, civs) = world();
        let ai = ActionOrigin::Ai {
            module: "financial".into(),
        };
        assert!(revalidate(&players, &civs, &queued("p1", "solace", "trade", ActionOrigin::Player)).is_ok());
        assert!(revalidate(&players, &civs, &queued("hal", "orion", "policy", ai)).is_ok());
    }

    #[test]
    fn queued_actions_fail_once_control_moves() {
        let (mut players, mut civs) = world();
        let ai = ActionOrigin::Ai {
            module: "financial".into(),
        };

        // AI decision from a player that went back to human control
        if let Some(p1) = players.get_mut(&PlayerId::from("p1")) {
            p1.control = ControlType::Human;
        }
        assert_eq!(
            revalidate(&players, &civs, &queued("p1", "solace", "trade", ai.clone())),
            Err(ValidationError::ControlChanged(PlayerId::from("p1")).into())
        );

        civs.deactivate(&CivilizationId::from("orion"));
        assert_eq!(
            revalidate(&players, &civs, &queued("hal", "orion", "policy", ai.clone())),
            Err(ValidationError::InactiveCivilization(CivilizationId::from("orion")).into())
        );

        players.remove(&PlayerId::from("hal"));
        assert_eq!(
            revalidate(&players, &civs, &queued("hal", "orion", "policy", ai)),
            Err(EngineError::UnknownPlayer(PlayerId::from("hal")))
        );

        assert_eq!(
            revalidate(&players, &civs, &queued("p1", "orion", "trade", ActionOrigin::Player)),
            Err(ValidationError::ControlChanged(PlayerId::from("p1")).into())
        );
    }
}
