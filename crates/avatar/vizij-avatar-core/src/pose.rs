//! Accumulation of per-channel clip contributions and blending into a final pose.
//!
//! Each playing (or fading) playback adds `value * weight` for every channel it
//! animates. At finalize, a channel whose total weight reaches 1 becomes the
//! weighted mean; below 1 the remainder is filled from the rest pose so fades
//! blend against the natural pose instead of snapping.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::clip::PoseChannel;

/// One bone's local transform as seen by a scene host.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    /// Euler rotation (x, y, z) in radians.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl BoneTransform {
    #[inline]
    pub fn set(&mut self, channel: PoseChannel, value: f32) {
        let i = channel.axis_index();
        if channel.is_rotation() {
            self.rotation[i] = value;
        } else {
            self.scale[i] = value;
        }
    }

    #[inline]
    pub fn get(&self, channel: PoseChannel) -> f32 {
        let i = channel.axis_index();
        if channel.is_rotation() {
            self.rotation[i]
        } else {
            self.scale[i]
        }
    }
}

/// Rest rotations per bone. Bones not listed rest at zero rotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaturalPose {
    pub bones: BTreeMap<String, [f32; 3]>,
}

impl Default for NaturalPose {
    /// Arms lowered along the body; forearms and hands straight.
    fn default() -> Self {
        let mut bones = BTreeMap::new();
        bones.insert("J_Bip_L_UpperArm".to_string(), [0.0, 0.0, 1.35]);
        bones.insert("J_Bip_R_UpperArm".to_string(), [0.0, 0.0, -1.35]);
        for b in [
            "J_Bip_L_LowerArm",
            "J_Bip_R_LowerArm",
            "J_Bip_L_Hand",
            "J_Bip_R_Hand",
        ] {
            bones.insert(b.to_string(), [0.0; 3]);
        }
        Self { bones }
    }
}

impl NaturalPose {
    pub fn empty() -> Self {
        Self {
            bones: BTreeMap::new(),
        }
    }

    /// Rest value for a channel: the stored rotation, or identity (0 rotation, 1 scale).
    pub fn rest_value(&self, bone: &str, channel: PoseChannel) -> f32 {
        if !channel.is_rotation() {
            return 1.0;
        }
        self.bones
            .get(bone)
            .map(|r| r[channel.axis_index()])
            .unwrap_or(0.0)
    }

    pub fn set_rotation_axis(&mut self, bone: &str, channel: PoseChannel, value: f32) {
        if !channel.is_rotation() {
            return;
        }
        let entry = self.bones.entry(bone.to_string()).or_insert([0.0; 3]);
        entry[channel.axis_index()] = value;
    }
}

/// One blended channel value for this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelWrite {
    pub bone: String,
    pub channel: PoseChannel,
    pub value: f32,
}

/// Final skeletal writes for a frame, ordered by (bone, channel).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub writes: Vec<ChannelWrite>,
}

impl Pose {
    pub fn get(&self, bone: &str, channel: PoseChannel) -> Option<f32> {
        self.writes
            .iter()
            .find(|w| w.bone == bone && w.channel == channel)
            .map(|w| w.value)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct AccumEntry {
    sum: f32,
    w: f32,
}

/// Accumulates per-channel contributions across playbacks.
#[derive(Default)]
pub struct PoseAccumulator {
    map: HashMap<(String, PoseChannel), AccumEntry>,
}

impl PoseAccumulator {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn add(&mut self, bone: &str, channel: PoseChannel, value: f32, weight: f32) {
        if weight <= 0.0 || !value.is_finite() {
            return;
        }
        let entry = self
            .map
            .entry((bone.to_string(), channel))
            .or_insert_with(AccumEntry::default);
        entry.sum += value * weight;
        entry.w += weight;
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn finalize(self, rest: &NaturalPose) -> Pose {
        let mut writes: Vec<ChannelWrite> = self
            .map
            .into_iter()
            .map(|((bone, channel), e)| {
                let value = if e.w >= 1.0 {
                    e.sum / e.w
                } else {
                    rest.rest_value(&bone, channel) * (1.0 - e.w) + e.sum
                };
                ChannelWrite {
                    bone,
                    channel,
                    value,
                }
            })
            .collect();
        writes.sort_by(|a, b| a.bone.cmp(&b.bone).then(a.channel.cmp(&b.channel)));
        Pose { writes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-5, "left={a} right={b}");
    }

    #[test]
    fn full_weight_is_weighted_mean() {
        let mut acc = PoseAccumulator::new();
        acc.add("J_Bip_C_Head", PoseChannel::RotationX, 0.2, 1.0);
        acc.add("J_Bip_C_Head", PoseChannel::RotationX, 0.4, 1.0);
        let pose = acc.finalize(&NaturalPose::empty());
        approx(pose.get("J_Bip_C_Head", PoseChannel::RotationX).unwrap(), 0.3);
    }

    #[test]
    fn partial_weight_blends_against_rest() {
        let rest = NaturalPose::default();
        let mut acc = PoseAccumulator::new();
        acc.add("J_Bip_L_UpperArm", PoseChannel::RotationZ, 0.35, 0.5);
        acc.add("J_Bip_C_Spine", PoseChannel::ScaleY, 1.2, 0.5);
        let pose = acc.finalize(&rest);
        approx(
            pose.get("J_Bip_L_UpperArm", PoseChannel::RotationZ).unwrap(),
            1.35 * 0.5 + 0.35 * 0.5,
        );
        approx(pose.get("J_Bip_C_Spine", PoseChannel::ScaleY).unwrap(), 1.1);
    }

    #[test]
    fn zero_weight_is_ignored_and_writes_are_sorted() {
        let mut acc = PoseAccumulator::new();
        acc.add("b", PoseChannel::RotationY, 1.0, 0.0);
        assert!(acc.is_empty());
        acc.add("b", PoseChannel::RotationY, 1.0, 1.0);
        acc.add("a", PoseChannel::RotationZ, 1.0, 1.0);
        acc.add("b", PoseChannel::RotationX, 1.0, 1.0);
        let pose = acc.finalize(&NaturalPose::empty());
        let keys: Vec<(&str, PoseChannel)> = pose
            .writes
            .iter()
            .map(|w| (w.bone.as_str(), w.channel))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a", PoseChannel::RotationZ),
                ("b", PoseChannel::RotationX),
                ("b", PoseChannel::RotationY)
            ]
        );
    }

    #[test]
    fn natural_pose_rest_values() {
        let mut rest = NaturalPose::default();
        approx(rest.rest_value("J_Bip_R_UpperArm", PoseChannel::RotationZ), -1.35);
        approx(rest.rest_value("unknown", PoseChannel::RotationZ), 0.0);
        approx(rest.rest_value("unknown", PoseChannel::ScaleX), 1.0);
        rest.set_rotation_axis("J_Bip_C_Head", PoseChannel::RotationY, 0.2);
        approx(rest.rest_value("J_Bip_C_Head", PoseChannel::RotationY), 0.2);
        rest.set_rotation_axis("J_Bip_C_Head", PoseChannel::ScaleY, 3.0);
        approx(rest.rest_value("J_Bip_C_Head", PoseChannel::ScaleY), 1.0);
    }
}
