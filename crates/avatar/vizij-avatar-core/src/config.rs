//! Core configuration for vizij-avatar-core.
//!
//! All timings are in seconds unless the field name says otherwise. Every field
//! has a serde default so partial JSON configs are accepted.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, AvatarResult};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub blend_shapes: BlendShapeConfig,
    pub lipsync: LipsyncConfig,
    pub blink: BlinkConfig,
    pub session: SessionConfig,
}

impl Config {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json(s: &str) -> AvatarResult<Self> {
        serde_json::from_str(s).map_err(|e| AvatarError::Config(e.to_string()))
    }
}

/// RNG for jitter and blink timing: fixed when a seed is configured, entropy otherwise.
pub(crate) fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Animation layer player and state machine timings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Fade-in used when neither the call nor the clip names one.
    pub default_blend_seconds: f32,
    /// Grace window during which a preempted/stopped playback still renders.
    pub fade_out_seconds: f32,
    /// Blend used by behavior state transitions.
    pub state_blend_seconds: f32,
    /// Auto-revert delay for `animation` commands without an explicit duration.
    pub animation_revert_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_blend_seconds: 0.3,
            fade_out_seconds: 0.2,
            state_blend_seconds: 0.5,
            animation_revert_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlendShapeConfig {
    /// Requests closer than this to the channel's target are ignored.
    pub dead_zone: f32,
    pub transition_seconds: f32,
    pub emotion_transition_seconds: f32,
    pub emotion_reset_seconds: f32,
    pub clear_seconds: f32,
    pub lipsync_transition_seconds: f32,
    pub emotion_priority: i32,
    pub lipsync_priority: i32,
    /// Auto-reset delay for `emotion` commands without an explicit duration.
    pub emotion_reset_ms: u64,
}

impl Default for BlendShapeConfig {
    fn default() -> Self {
        Self {
            dead_zone: 0.01,
            transition_seconds: 0.3,
            emotion_transition_seconds: 0.5,
            emotion_reset_seconds: 0.3,
            clear_seconds: 0.2,
            lipsync_transition_seconds: 0.1,
            emotion_priority: 5,
            lipsync_priority: 10,
            emotion_reset_ms: 2000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LipsyncConfig {
    /// Fraction of the remaining distance covered per tick.
    pub smoothing: f32,
    /// Jitter is applied above this energy.
    pub jitter_threshold: f32,
    /// Jitter half-range, scaled by energy.
    pub jitter_amplitude: f32,
    /// The mouth is closed below this energy.
    pub close_threshold: f32,
    pub close_decay: f32,
    /// Values under this snap to zero while closing.
    pub snap_below: f32,
    /// Optional output gain `base + slope * energy` on vowel values. The
    /// default (1, 0) passes frames through unscaled.
    pub gain_base: f32,
    pub gain_slope: f32,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for LipsyncConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.3,
            jitter_threshold: 0.1,
            jitter_amplitude: 0.035,
            close_threshold: 0.07,
            close_decay: 0.7,
            snap_below: 0.01,
            gain_base: 1.0,
            gain_slope: 0.0,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlinkConfig {
    pub enabled: bool,
    pub channel: String,
    pub min_interval_seconds: f32,
    pub max_interval_seconds: f32,
    pub closed_value: f32,
    pub closed_seconds: f32,
    pub transition_seconds: f32,
    pub priority: i32,
    pub seed: Option<u64>,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "Fcl_EYE_Close".to_string(),
            min_interval_seconds: 3.0,
            max_interval_seconds: 7.0,
            closed_value: 0.7,
            closed_seconds: 0.15,
            transition_seconds: 0.04,
            priority: 1,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Snapshots older than this are discarded on restore.
    pub max_age_ms: u64,
    /// Delay before a restored movement is replayed.
    pub restore_movement_delay_ms: u64,
    /// Delay before a restored emotion is reapplied.
    pub restore_emotion_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 5 * 60 * 1000,
            restore_movement_delay_ms: 1000,
            restore_emotion_delay_ms: 1500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{ "player": { "fade_out_seconds": 0.5 } }"#).unwrap();
        assert_eq!(cfg.player.fade_out_seconds, 0.5);
        assert_eq!(cfg.player.default_blend_seconds, 0.3);
        assert_eq!(cfg.blend_shapes, BlendShapeConfig::default());
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = Config::from_json("{ nope").unwrap_err();
        assert!(matches!(err, AvatarError::Config(_)));
    }
}
