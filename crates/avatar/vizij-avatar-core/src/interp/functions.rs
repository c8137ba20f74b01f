//! Interpolation helpers:
//! - lerp_f32 (linear)
//! - ease_out_quad (blend-shape transitions)
//! - fmod (positive modulo used for looping playback time)

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Quadratic ease-out: fast start, slow settle. `t` is clamped to [0,1].
#[inline]
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * (2.0 - t)
}

/// Modulo whose result has the sign of `b` (so looping time never goes negative).
#[inline]
pub fn fmod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if (m < 0.0 && b > 0.0) || (m > 0.0 && b < 0.0) {
        m + b
    } else {
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_out_endpoints_and_shape() {
        assert_eq!(ease_out_quad(0.0), 0.0);
        assert_eq!(ease_out_quad(1.0), 1.0);
        assert_eq!(ease_out_quad(2.0), 1.0);
        // Ahead of linear in the middle.
        assert!(ease_out_quad(0.5) > 0.5);
        assert!((ease_out_quad(0.5) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn fmod_wraps_negative() {
        assert!((fmod(-0.5, 2.0) - 1.5).abs() < 1e-6);
        assert!((fmod(4.5, 2.0) - 0.5).abs() < 1e-6);
        assert_eq!(fmod(1.0, 0.0), 0.0);
    }
}
