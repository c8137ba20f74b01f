//! Built-in procedural clips over the VRM humanoid rig.

use crate::clip::{AnimationClip, BoneTrack, PoseChannel};

pub const SPINE: &str = "J_Bip_C_Spine";
pub const NECK: &str = "J_Bip_C_Neck";
pub const HEAD: &str = "J_Bip_C_Head";
pub const L_UPPER_ARM: &str = "J_Bip_L_UpperArm";
pub const R_UPPER_ARM: &str = "J_Bip_R_UpperArm";
pub const L_LOWER_ARM: &str = "J_Bip_L_LowerArm";
pub const R_LOWER_ARM: &str = "J_Bip_R_LowerArm";
pub const L_HAND: &str = "J_Bip_L_Hand";
pub const R_HAND: &str = "J_Bip_R_Hand";

use PoseChannel::{RotationX as RX, RotationY as RY, RotationZ as RZ, ScaleY as SY};

fn track(bone: &str, channel: PoseChannel, times: &[f32], values: &[f32]) -> BoneTrack {
    BoneTrack::linear(bone, channel, times, values)
}

/// Evenly spaced key times `0, step, 2*step, ..` for `n` keys.
fn steps(n: usize, step: f32) -> Vec<f32> {
    (0..n).map(|i| i as f32 * step).collect()
}

pub fn idle() -> AnimationClip {
    let t = steps(5, 1.0);
    AnimationClip::new(
        "idle",
        4.0,
        vec![
            track(L_UPPER_ARM, RX, &t, &[0.0, 0.03, 0.0, -0.03, 0.0]),
            track(R_UPPER_ARM, RX, &t, &[0.0, -0.03, 0.0, 0.03, 0.0]),
            track(SPINE, SY, &t, &[1.0, 1.008, 1.0, 0.992, 1.0]),
        ],
    )
}

pub fn breathing() -> AnimationClip {
    AnimationClip::new(
        "breathing",
        3.0,
        vec![track(SPINE, SY, &[0.0, 1.5, 3.0], &[1.0, 1.01, 1.0])],
    )
}

pub fn talking() -> AnimationClip {
    AnimationClip::new(
        "talking",
        3.0,
        vec![
            track(
                HEAD,
                RZ,
                &steps(7, 0.5),
                &[0.0, 0.005, -0.003, 0.008, -0.005, 0.003, 0.0],
            ),
            track(HEAD, RX, &steps(5, 0.75), &[0.0, 0.003, -0.001, 0.005, 0.0]),
            track(
                NECK,
                RZ,
                &steps(7, 0.5),
                &[0.0, 0.003, -0.002, 0.004, -0.003, 0.002, 0.0],
            ),
        ],
    )
}

pub fn active_talking() -> AnimationClip {
    let t9 = steps(9, 0.25);
    AnimationClip::new(
        "active_talking",
        2.0,
        vec![
            track(
                HEAD,
                RZ,
                &t9,
                &[0.0, 0.01, -0.005, 0.015, -0.01, 0.005, -0.015, 0.01, 0.0],
            ),
            track(HEAD, RX, &steps(5, 0.5), &[0.0, 0.008, -0.003, 0.012, 0.0]),
            track(
                NECK,
                RZ,
                &t9,
                &[0.0, 0.006, -0.003, 0.008, -0.005, 0.003, -0.008, 0.005, 0.0],
            ),
        ],
    )
}

pub fn thinking_move() -> AnimationClip {
    let t5 = steps(5, 1.0);
    let arm_t = [0.0, 1.5, 3.0, 4.0];
    AnimationClip::new(
        "thinking_move",
        4.0,
        vec![
            track(HEAD, RZ, &t5, &[0.0, 0.05, -0.03, 0.04, 0.0]),
            track(HEAD, RX, &t5, &[0.0, 0.02, 0.03, 0.02, 0.0]),
            track(
                HEAD,
                RY,
                &steps(9, 0.5),
                &[0.0, 0.01, -0.005, 0.015, -0.01, 0.005, -0.015, 0.01, 0.0],
            ),
            track(NECK, RZ, &t5, &[0.0, 0.03, -0.02, 0.025, 0.0]),
            track(NECK, RX, &t5, &[0.0, 0.015, 0.025, 0.015, 0.0]),
            track(SPINE, RX, &t5, &[0.0, 0.01, 0.015, 0.01, 0.0]),
            track(R_UPPER_ARM, RX, &arm_t, &[0.0, -0.3, -0.3, 0.0]),
            track(R_LOWER_ARM, RX, &arm_t, &[0.0, -0.2, -0.2, 0.0]),
        ],
    )
}

pub fn greeting() -> AnimationClip {
    let t = steps(5, 0.5);
    AnimationClip::new(
        "greeting",
        2.0,
        vec![
            track(R_UPPER_ARM, RX, &t, &[0.0, -0.5, -0.5, 0.0, 0.0]),
            track(R_LOWER_ARM, RX, &t, &[0.0, -0.25, -0.25, 0.0, 0.0]),
        ],
    )
}

pub fn stretching() -> AnimationClip {
    let t = [0.0, 1.5, 3.0];
    AnimationClip::new(
        "stretching",
        3.0,
        vec![
            track(L_UPPER_ARM, RX, &t, &[0.0, -0.5, 0.0]),
            track(R_UPPER_ARM, RX, &t, &[0.0, -0.5, 0.0]),
        ],
    )
}

pub fn surprise() -> AnimationClip {
    let t = [0.0, 0.5, 1.0];
    AnimationClip::new(
        "surprise",
        1.0,
        vec![
            track(HEAD, RY, &t, &[0.0, 0.1, 0.0]),
            track(L_UPPER_ARM, RX, &t, &[0.0, -0.3, 0.0]),
            track(R_UPPER_ARM, RX, &t, &[0.0, -0.3, 0.0]),
        ],
    )
}

pub fn excitement() -> AnimationClip {
    let t = steps(5, 0.5);
    let v = [0.0, -0.4, 0.0, -0.4, 0.0];
    AnimationClip::new(
        "excitement",
        2.0,
        vec![track(L_UPPER_ARM, RX, &t, &v), track(R_UPPER_ARM, RX, &t, &v)],
    )
}

pub fn listening() -> AnimationClip {
    AnimationClip::new(
        "listening",
        4.0,
        vec![
            track(HEAD, RY, &steps(5, 1.0), &[0.0, 0.03, 0.0, -0.03, 0.0]),
            track(SPINE, RX, &[0.0, 2.0, 4.0], &[0.0, 0.03, 0.0]),
        ],
    )
}

/// Slow head and neck tilt, nod and turn layered under speech.
pub fn head_micro_movements() -> AnimationClip {
    let t7 = steps(7, 1.0);
    let t5 = steps(5, 1.5);
    AnimationClip::new(
        "head_micro_movements",
        6.0,
        vec![
            track(HEAD, RZ, &t7, &[0.0, 0.008, -0.004, 0.012, -0.008, 0.004, 0.0]),
            track(HEAD, RX, &t5, &[0.0, 0.005, -0.002, 0.008, 0.0]),
            track(HEAD, RY, &steps(4, 2.0), &[0.0, 0.003, -0.005, 0.0]),
            track(NECK, RZ, &t7, &[0.0, 0.004, -0.002, 0.006, -0.004, 0.002, 0.0]),
            track(NECK, RX, &t5, &[0.0, 0.003, -0.001, 0.004, 0.0]),
        ],
    )
}

/// Every built-in clip, in registration order.
pub fn standard_clips() -> Vec<AnimationClip> {
    vec![
        idle(),
        breathing(),
        talking(),
        active_talking(),
        thinking_move(),
        greeting(),
        stretching(),
        surprise(),
        excitement(),
        listening(),
        head_micro_movements(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::BehaviorState;

    #[test]
    fn all_clips_validate() {
        for clip in standard_clips() {
            clip.validate()
                .unwrap_or_else(|e| panic!("{}: {e}", clip.name));
        }
    }

    #[test]
    fn every_state_clip_exists() {
        let names: Vec<String> = standard_clips().into_iter().map(|c| c.name).collect();
        for st in BehaviorState::ALL {
            assert!(names.iter().any(|n| n == st.clip()), "missing {}", st.clip());
        }
    }

    #[test]
    fn head_micro_movements_is_a_movement_clip() {
        let clip = head_micro_movements();
        assert_eq!(clip.duration, 6.0);
        assert_eq!(clip.tracks.len(), 5);
        assert_eq!(
            crate::layers::LayerInference::default().infer(&clip.name),
            crate::layers::PriorityLayer::Movement
        );
    }

    #[test]
    fn loops_close_on_their_start_value() {
        for clip in standard_clips() {
            for tr in &clip.tracks {
                let first = tr.keyframes[0].value;
                let last = tr.keyframes[tr.keyframes.len() - 1].value;
                assert_eq!(first, last, "{} {} {:?}", clip.name, tr.bone, tr.channel);
            }
        }
    }
}
