//! Validation errors reported to the requesting client.

use serde::{Serialize, Deserialize};

use crate::game::block::BlockType;
use crate::game::field::{SwapError, TapError};
use crate::game::skills::SkillKind;

/// Wire error codes carried by `ErrorResponse`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    NotLoggedIn = 1,
    AlreadyLoggedIn = 2,
    NotInMatch = 3,
    AlreadyInMatch = 4,
    AlreadyQueued = 5,
    NotEnoughMana = 10,
    NotEnoughEnergy = 11,
    InvalidSwap = 20,
    InvalidTap = 21,
    UpgradeMaxed = 22,
    SkillUnavailable = 23,
    UnknownPlayer = 30,
    Storage = 31,
}

/// Request validation failure. State is never mutated when one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("not in a match")]
    NotInMatch,

    #[error("already in a match")]
    AlreadyInMatch,

    #[error("already queued")]
    AlreadyQueued,

    #[error("not enough mana: need {required}, have {available}")]
    NotEnoughMana { required: f32, available: f32 },

    #[error("not enough energy: need {required}, have {available}")]
    NotEnoughEnergy { required: f32, available: f32 },

    #[error("invalid swap: {0}")]
    InvalidSwap(#[from] SwapError),

    #[error("invalid tap: {0}")]
    InvalidTap(#[from] TapError),

    #[error("{0:?} is already at max level")]
    UpgradeMaxed(BlockType),

    #[error("skill {0:?} not in loadout")]
    SkillUnavailable(SkillKind),

    #[error("unknown player")]
    UnknownPlayer,

    #[error("storage error: {0}")]
    Storage(String),
}

impl GameError {
    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::NotLoggedIn => ErrorCode::NotLoggedIn,
            GameError::AlreadyLoggedIn => ErrorCode::AlreadyLoggedIn,
            GameError::NotInMatch => ErrorCode::NotInMatch,
            GameError::AlreadyInMatch => ErrorCode::AlreadyInMatch,
            GameError::AlreadyQueued => ErrorCode::AlreadyQueued,
            GameError::NotEnoughMana { .. } => ErrorCode::NotEnoughMana,
            GameError::NotEnoughEnergy { .. } => ErrorCode::NotEnoughEnergy,
            GameError::InvalidSwap(_) => ErrorCode::InvalidSwap,
            GameError::InvalidTap(_) => ErrorCode::InvalidTap,
            GameError::UpgradeMaxed(_) => ErrorCode::UpgradeMaxed,
            GameError::SkillUnavailable(_) => ErrorCode::SkillUnavailable,
            GameError::UnknownPlayer => ErrorCode::UnknownPlayer,
            GameError::Storage(_) => ErrorCode::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = GameError::NotEnoughMana { required: 20.0, available: 15.0 };
        assert_eq!(err.code(), ErrorCode::NotEnoughMana);
        assert_eq!(err.to_string(), "not enough mana: need 20, have 15");

        let err: GameError = SwapError::SameType.into();
        assert_eq!(err.code(), ErrorCode::InvalidSwap);
    }
}
