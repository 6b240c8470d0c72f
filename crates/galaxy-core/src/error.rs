//! Error taxonomy for lifecycle and action operations.
//!
//! Failures inside system units and AI modules are not errors of this kind:
//! they are recorded by the failure ledger and never surface to callers.

use crate::ids::{CivilizationId, PlayerId};

/// Errors surfaced synchronously to callers of engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("action rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("civilization {civilization} is already controlled by {controller}")]
    DuplicateCivilization {
        civilization: CivilizationId,
        controller: PlayerId,
    },
    #[error("unknown civilization {0}")]
    UnknownCivilization(CivilizationId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is already registered")]
    DuplicatePlayer(PlayerId),
    #[error("game is full ({0} players)")]
    GameFull(usize),
    #[error("game has ended")]
    GameEnded,
}

/// Reasons a submitted action or registration request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("action type must not be empty")]
    EmptyActionType,
    #[error("player {0} is not connected")]
    Disconnected(PlayerId),
    #[error("player {player} lacks capability for {action}")]
    MissingCapability { player: PlayerId, action: String },
    #[error("player {0} does not control a civilization")]
    NoCivilization(PlayerId),
    #[error("civilization {0} is not active")]
    InactiveCivilization(CivilizationId),
    #[error("player {0} no longer holds the control this action was queued under")]
    ControlChanged(PlayerId),
    #[error("observers cannot control a civilization")]
    ObserverCannotControl,
}

pub type EngineResult<T> = Result<T, EngineError>;
