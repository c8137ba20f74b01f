//! Skeletal clip data model.
//!
//! A clip is a set of per-bone keyframe tracks, each driving one scalar channel
//! (an Euler rotation axis or a scale axis). Keyframe times are in seconds within
//! `[0, duration]`. Clips are immutable once registered.

use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, AvatarResult};

/// The scalar property of a bone a track drives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseChannel {
    RotationX,
    RotationY,
    RotationZ,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl PoseChannel {
    pub fn is_rotation(self) -> bool {
        matches!(
            self,
            PoseChannel::RotationX | PoseChannel::RotationY | PoseChannel::RotationZ
        )
    }

    /// Component index (x=0, y=1, z=2).
    pub fn axis_index(self) -> usize {
        match self {
            PoseChannel::RotationX | PoseChannel::ScaleX => 0,
            PoseChannel::RotationY | PoseChannel::ScaleY => 1,
            PoseChannel::RotationZ | PoseChannel::ScaleZ => 2,
        }
    }

    /// Rotation channel for an axis letter (`x`, `y`, `z`).
    pub fn rotation_axis(axis: &str) -> Option<Self> {
        match axis {
            "x" | "X" => Some(PoseChannel::RotationX),
            "y" | "Y" => Some(PoseChannel::RotationY),
            "z" | "Z" => Some(PoseChannel::RotationZ),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    /// Hold the left key until the next one.
    Step,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Seconds from clip start.
    pub time: f32,
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: String,
    pub channel: PoseChannel,
    #[serde(default)]
    pub interpolation: Interpolation,
    pub keyframes: Vec<Keyframe>,
}

impl BoneTrack {
    /// Build a linear track from parallel time/value lists (the usual procedural form).
    pub fn linear(bone: &str, channel: PoseChannel, times: &[f32], values: &[f32]) -> Self {
        Self {
            bone: bone.to_string(),
            channel,
            interpolation: Interpolation::Linear,
            keyframes: times
                .iter()
                .zip(values.iter())
                .map(|(&time, &value)| Keyframe { time, value })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Clip length in seconds; playback loops within it.
    pub duration: f32,
    pub tracks: Vec<BoneTrack>,
    /// Per-clip default fade-in, used when `play` is not given one.
    #[serde(default)]
    pub blend_seconds: Option<f32>,
}

impl AnimationClip {
    pub fn new(name: &str, duration: f32, tracks: Vec<BoneTrack>) -> Self {
        Self {
            name: name.to_string(),
            duration,
            tracks,
            blend_seconds: None,
        }
    }

    pub fn with_blend_seconds(mut self, seconds: f32) -> Self {
        self.blend_seconds = Some(seconds);
        self
    }

    /// Parse and validate a clip from JSON.
    pub fn from_json(s: &str) -> AvatarResult<Self> {
        let clip: AnimationClip =
            serde_json::from_str(s).map_err(|e| AvatarError::InvalidClip(e.to_string()))?;
        clip.validate()?;
        Ok(clip)
    }

    /// Validate basic invariants (positive duration, keys in range and non-decreasing).
    pub fn validate(&self) -> AvatarResult<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(AvatarError::InvalidClip(format!(
                "'{}' duration must be > 0 s",
                self.name
            )));
        }
        if let Some(b) = self.blend_seconds {
            if !b.is_finite() || b < 0.0 {
                return Err(AvatarError::InvalidClip(format!(
                    "'{}' blend_seconds must be >= 0",
                    self.name
                )));
            }
        }
        for track in &self.tracks {
            if track.keyframes.is_empty() {
                return Err(AvatarError::InvalidClip(format!(
                    "'{}' track {}/{:?} has no keyframes",
                    self.name, track.bone, track.channel
                )));
            }
            let mut last = -f32::INFINITY;
            for k in &track.keyframes {
                if !k.time.is_finite() || !k.value.is_finite() {
                    return Err(AvatarError::InvalidClip(format!(
                        "'{}' track {} has a non-finite key",
                        self.name, track.bone
                    )));
                }
                if k.time < 0.0 || k.time > self.duration {
                    return Err(AvatarError::InvalidClip(format!(
                        "'{}' track {} key at {} outside [0, {}]",
                        self.name, track.bone, k.time, self.duration
                    )));
                }
                if k.time < last {
                    return Err(AvatarError::InvalidClip(format!(
                        "'{}' track {} key times must be non-decreasing",
                        self.name, track.bone
                    )));
                }
                last = k.time;
            }
        }
        Ok(())
    }

    /// Names of all bones this clip touches (deduplicated, in track order).
    pub fn bones(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in &self.tracks {
            if !out.contains(&t.bone.as_str()) {
                out.push(t.bone.as_str());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> AnimationClip {
        AnimationClip::new(
            "wave",
            2.0,
            vec![BoneTrack::linear(
                "J_Bip_R_UpperArm",
                PoseChannel::RotationX,
                &[0.0, 1.0, 2.0],
                &[0.0, -0.5, 0.0],
            )],
        )
    }

    #[test]
    fn valid_clip_passes() {
        assert!(wave().validate().is_ok());
        assert_eq!(wave().bones(), vec!["J_Bip_R_UpperArm"]);
    }

    #[test]
    fn rejects_zero_duration_and_out_of_range_keys() {
        let mut c = wave();
        c.duration = 0.0;
        assert!(matches!(c.validate(), Err(AvatarError::InvalidClip(_))));

        let mut c = wave();
        c.tracks[0].keyframes[2].time = 3.0;
        assert!(c.validate().is_err());

        let mut c = wave();
        c.tracks[0].keyframes.swap(0, 1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn parses_json_with_defaults() {
        let json = r#"{
            "name": "nod",
            "duration": 1.0,
            "tracks": [
                { "bone": "J_Bip_C_Head", "channel": "rotation_x",
                  "keyframes": [ { "time": 0.0, "value": 0.0 }, { "time": 1.0, "value": 0.1 } ] }
            ]
        }"#;
        let clip = AnimationClip::from_json(json).unwrap();
        assert_eq!(clip.tracks[0].interpolation, Interpolation::Linear);
        assert_eq!(clip.blend_seconds, None);
    }

    #[test]
    fn rotation_axis_lookup() {
        assert_eq!(PoseChannel::rotation_axis("y"), Some(PoseChannel::RotationY));
        assert_eq!(PoseChannel::rotation_axis("w"), None);
        assert_eq!(PoseChannel::ScaleZ.axis_index(), 2);
        assert!(!PoseChannel::ScaleZ.is_rotation());
    }
}
