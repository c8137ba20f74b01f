//! Track sampling.
//!
//! Model:
//! - Each BoneTrack has keyframes with non-decreasing times in seconds.
//! - Before the first key the first value holds; after the last key the last value holds.
//! - Linear tracks interpolate between the surrounding keys; Step tracks hold the left key.

use crate::clip::{BoneTrack, Interpolation, Keyframe};
use crate::interp::functions::lerp_f32;

/// Find the segment [i, i+1] containing time t and return (i, i+1, local_t) with
/// local_t normalized to [0,1] between the two key times.
/// Edge cases:
/// - t <= first.time returns (0, 0, 0).
/// - t >= last.time returns (last, last, 0).
fn find_segment(keys: &[Keyframe], t: f32) -> (usize, usize, f32) {
    let n = keys.len();
    if n == 0 {
        return (0, 0, 0.0);
    }
    if n == 1 || t <= keys[0].time {
        return (0, 0, 0.0);
    }
    if t >= keys[n - 1].time {
        return (n - 1, n - 1, 0.0);
    }
    // Keys are sorted by time; the first key strictly after t closes the segment.
    let right = keys.partition_point(|k| k.time <= t).min(n - 1);
    let left = right.saturating_sub(1);
    let t0 = keys[left].time;
    let t1 = keys[right].time;
    let denom = (t1 - t0).max(f32::EPSILON);
    (left, right, ((t - t0) / denom).clamp(0.0, 1.0))
}

/// Sample a track at time `t` seconds. Empty tracks sample as 0.0.
pub fn sample_track(track: &BoneTrack, t: f32) -> f32 {
    let keys = &track.keyframes;
    match keys.len() {
        0 => 0.0,
        1 => keys[0].value,
        _ => {
            let (i0, i1, lt) = find_segment(keys, t);
            if i0 == i1 {
                return keys[i0].value;
            }
            match track.interpolation {
                Interpolation::Step => keys[i0].value,
                Interpolation::Linear => lerp_f32(keys[i0].value, keys[i1].value, lt),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::PoseChannel;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-5, "left={a} right={b}");
    }

    #[test]
    fn linear_between_and_outside_keys() {
        let tr = BoneTrack::linear(
            "J_Bip_C_Head",
            PoseChannel::RotationZ,
            &[0.0, 1.0, 2.0],
            &[0.0, 1.0, -1.0],
        );
        approx(sample_track(&tr, 0.5), 0.5);
        approx(sample_track(&tr, 1.0), 1.0);
        approx(sample_track(&tr, 1.5), 0.0);
        approx(sample_track(&tr, -1.0), 0.0);
        approx(sample_track(&tr, 9.0), -1.0);
    }

    #[test]
    fn step_holds_left_key() {
        let mut tr = BoneTrack::linear("b", PoseChannel::ScaleY, &[0.0, 1.0], &[1.0, 2.0]);
        tr.interpolation = Interpolation::Step;
        approx(sample_track(&tr, 0.99), 1.0);
        approx(sample_track(&tr, 1.0), 2.0);
    }

    #[test]
    fn single_and_empty_tracks() {
        let tr = BoneTrack::linear("b", PoseChannel::RotationX, &[0.5], &[0.25]);
        approx(sample_track(&tr, 0.0), 0.25);
        let empty = BoneTrack::linear("b", PoseChannel::RotationX, &[], &[]);
        approx(sample_track(&empty, 0.3), 0.0);
    }
}
