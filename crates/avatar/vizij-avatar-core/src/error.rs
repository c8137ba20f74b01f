//! Error taxonomy for the avatar core.
//!
//! Every fallible core operation reports through [`AvatarError`]; callers log and
//! carry on. Nothing in the per-frame path panics on bad input.

use thiserror::Error;

use crate::state_machine::BehaviorState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AvatarError {
    /// `play`/`stop` referenced a clip that was never registered.
    #[error("unknown animation '{0}'")]
    UnknownAnimation(String),
    /// Emotion preset lookup miss.
    #[error("unknown emotion '{0}'")]
    UnknownEmotion(String),
    #[error("transition {from} -> {to} is not allowed")]
    IllegalTransition {
        from: BehaviorState,
        to: BehaviorState,
    },
    /// Pose control referenced a bone the current rig does not have.
    #[error("bone '{0}' not found on skeleton")]
    MissingBone(String),
    #[error("unknown behavior state '{0}'")]
    UnknownState(String),
    #[error("invalid clip: {0}")]
    InvalidClip(String),
    #[error("command error: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("session store error: {0}")]
    Store(String),
}

pub type AvatarResult<T> = Result<T, AvatarError>;
