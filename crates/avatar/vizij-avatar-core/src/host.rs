//! Scene host seam.
//!
//! The renderer owns the skeleton and meshes. The core reaches them through
//! [`SceneHost`]: bone lookup by name and a traversal over meshes exposing
//! morph name -> index maps with mutable weight arrays. Rigs vary, so a bone the
//! skeleton lacks is skipped rather than reported as a failure.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, AvatarResult};
use crate::library;
use crate::outputs::FrameOutput;
use crate::pose::{BoneTransform, NaturalPose};

/// One mesh's morph targets.
pub trait MorphTargets {
    fn morph_index(&self, name: &str) -> Option<usize>;
    fn weights_mut(&mut self) -> &mut [f32];
}

pub trait SceneHost {
    fn bone_mut(&mut self, name: &str) -> Option<&mut BoneTransform>;

    /// Visit every mesh that carries morph targets.
    fn visit_morph_targets(&mut self, f: &mut dyn FnMut(&mut dyn MorphTargets));

    fn require_bone(&mut self, name: &str) -> AvatarResult<&mut BoneTransform> {
        self.bone_mut(name)
            .ok_or_else(|| AvatarError::MissingBone(name.to_string()))
    }
}

/// What one apply pass touched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Bone channels written.
    pub written: usize,
    /// Morph weights written, counted per mesh.
    pub morphs_written: usize,
    /// Bones the frame referenced that the skeleton lacks (deduplicated).
    pub missing_bones: Vec<String>,
}

impl ApplyReport {
    fn missing(&mut self, err: AvatarError) {
        trace!("skipping: {err}");
        if let AvatarError::MissingBone(name) = err {
            if !self.missing_bones.contains(&name) {
                self.missing_bones.push(name);
            }
        }
    }
}

/// Write a frame's pose and morph weights into the host.
pub fn apply_frame<H: SceneHost + ?Sized>(host: &mut H, frame: &FrameOutput) -> ApplyReport {
    let mut report = ApplyReport::default();
    for w in &frame.pose.writes {
        match host.require_bone(&w.bone) {
            Ok(bone) => {
                bone.set(w.channel, w.value);
                report.written += 1;
            }
            Err(e) => report.missing(e),
        }
    }
    if !frame.morphs.is_empty() {
        let mut count = 0usize;
        host.visit_morph_targets(&mut |mesh: &mut dyn MorphTargets| {
            for m in &frame.morphs {
                let Some(idx) = mesh.morph_index(&m.name) else {
                    continue;
                };
                if let Some(slot) = mesh.weights_mut().get_mut(idx) {
                    *slot = m.value.clamp(0.0, 1.0);
                    count += 1;
                }
            }
        });
        report.morphs_written = count;
    }
    report
}

/// Write the rest rotation of every bone in `pose`.
pub fn apply_natural_pose<H: SceneHost + ?Sized>(host: &mut H, pose: &NaturalPose) -> ApplyReport {
    let mut report = ApplyReport::default();
    for (name, rotation) in &pose.bones {
        match host.require_bone(name) {
            Ok(bone) => {
                bone.rotation = *rotation;
                report.written += 3;
            }
            Err(e) => report.missing(e),
        }
    }
    report
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeadlessMesh {
    pub name: String,
    dictionary: HashMap<String, usize>,
    pub weights: Vec<f32>,
}

impl HeadlessMesh {
    pub fn new(name: &str, morphs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            dictionary: morphs
                .iter()
                .enumerate()
                .map(|(i, m)| (m.to_string(), i))
                .collect(),
            weights: vec![0.0; morphs.len()],
        }
    }

    pub fn weight(&self, morph: &str) -> Option<f32> {
        self.dictionary
            .get(morph)
            .and_then(|&i| self.weights.get(i).copied())
    }
}

impl MorphTargets for HeadlessMesh {
    fn morph_index(&self, name: &str) -> Option<usize> {
        self.dictionary.get(name).copied()
    }

    fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }
}

/// In-memory scene for tests, examples and headless playback.
#[derive(Clone, Debug, Default)]
pub struct HeadlessScene {
    pub bones: BTreeMap<String, BoneTransform>,
    pub meshes: Vec<HeadlessMesh>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bones(names: &[&str]) -> Self {
        Self {
            bones: names
                .iter()
                .map(|n| (n.to_string(), BoneTransform::default()))
                .collect(),
            meshes: Vec::new(),
        }
    }

    /// The upper-body VRM bones the built-in clips animate.
    pub fn vrm_upper_body() -> Self {
        Self::with_bones(&[
            library::SPINE,
            library::NECK,
            library::HEAD,
            library::L_UPPER_ARM,
            library::R_UPPER_ARM,
            library::L_LOWER_ARM,
            library::R_LOWER_ARM,
            library::L_HAND,
            library::R_HAND,
        ])
    }

    pub fn with_mesh(mut self, mesh: HeadlessMesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn bone(&self, name: &str) -> Option<&BoneTransform> {
        self.bones.get(name)
    }
}

impl SceneHost for HeadlessScene {
    fn bone_mut(&mut self, name: &str) -> Option<&mut BoneTransform> {
        self.bones.get_mut(name)
    }

    fn visit_morph_targets(&mut self, f: &mut dyn FnMut(&mut dyn MorphTargets)) {
        for mesh in &mut self.meshes {
            f(mesh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::PoseChannel;
    use crate::outputs::MorphWrite;
    use crate::pose::{ChannelWrite, Pose};

    fn frame() -> FrameOutput {
        FrameOutput {
            epoch: 1,
            pose: Pose {
                writes: vec![
                    ChannelWrite {
                        bone: "J_Bip_C_Head".into(),
                        channel: PoseChannel::RotationZ,
                        value: 0.1,
                    },
                    ChannelWrite {
                        bone: "J_Bip_L_Toe".into(),
                        channel: PoseChannel::RotationX,
                        value: 0.2,
                    },
                    ChannelWrite {
                        bone: "J_Bip_L_Toe".into(),
                        channel: PoseChannel::RotationY,
                        value: 0.2,
                    },
                ],
            },
            morphs: vec![
                MorphWrite {
                    name: "Fcl_MTH_A".into(),
                    value: 1.4,
                },
                MorphWrite {
                    name: "Fcl_HAP_HAP".into(),
                    value: 0.5,
                },
            ],
            events: Vec::new(),
        }
    }

    #[test]
    fn missing_bones_are_skipped() {
        let mut scene = HeadlessScene::vrm_upper_body();
        let report = apply_frame(&mut scene, &frame());
        assert_eq!(report.written, 1);
        assert_eq!(report.missing_bones, vec!["J_Bip_L_Toe".to_string()]);
        assert_eq!(scene.bone("J_Bip_C_Head").unwrap().rotation[2], 0.1);
    }

    #[test]
    fn morphs_written_on_every_mesh_that_defines_them() {
        let mut scene = HeadlessScene::new()
            .with_mesh(HeadlessMesh::new("face", &["Fcl_HAP_HAP", "Fcl_MTH_A"]))
            .with_mesh(HeadlessMesh::new("teeth", &["Fcl_MTH_A"]))
            .with_mesh(HeadlessMesh::new("hair", &[]));
        let report = apply_frame(&mut scene, &frame());
        assert_eq!(report.morphs_written, 3);
        assert_eq!(scene.meshes[0].weight("Fcl_MTH_A"), Some(1.0));
        assert_eq!(scene.meshes[0].weight("Fcl_HAP_HAP"), Some(0.5));
        assert_eq!(scene.meshes[1].weight("Fcl_MTH_A"), Some(1.0));
        assert_eq!(scene.meshes[2].weight("Fcl_MTH_A"), None);
    }

    #[test]
    fn natural_pose_writes_rest_rotations() {
        let mut scene = HeadlessScene::with_bones(&["J_Bip_L_UpperArm", "J_Bip_R_UpperArm"]);
        let report = apply_natural_pose(&mut scene, &NaturalPose::default());
        assert_eq!(scene.bone("J_Bip_R_UpperArm").unwrap().rotation, [0.0, 0.0, -1.35]);
        assert_eq!(report.missing_bones.len(), 4);
    }

    #[test]
    fn require_bone_reports_missing() {
        let mut scene = HeadlessScene::new();
        assert_eq!(
            scene.require_bone("J_Bip_C_Head").err(),
            Some(AvatarError::MissingBone("J_Bip_C_Head".into()))
        );
    }
}
