//! Interpolation and easing helpers.
//!
//! Keyframe sampling uses linear/step interpolation; blend-shape transitions use
//! quadratic ease-out.

pub mod functions;

pub use functions::{ease_out_quad, fmod, lerp_f32};
