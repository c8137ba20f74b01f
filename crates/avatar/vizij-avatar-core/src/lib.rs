//! Vizij Avatar Core (engine-agnostic)
//!
//! Arbitration engine for a real-time avatar: a priority-layered procedural clip
//! player, a blend-shape (morph) manager with eased transitions, a lip-sync
//! smoother, automatic blinking and a behavior state machine, all advanced from a
//! single [`AvatarRuntime::update`] call. Rendering stays with the host, which
//! receives a [`FrameOutput`] per tick or implements [`SceneHost`].

pub mod blend_shape;
pub mod blink;
pub mod clip;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod ids;
pub mod interp;
pub mod layers;
pub mod library;
pub mod lipsync;
pub mod outputs;
pub mod pose;
pub mod presets;
pub mod runtime;
pub mod sampling;
pub mod scheduler;
pub mod session;
pub mod state_machine;

// Re-exports for consumers (adapters)
pub use blend_shape::{ActiveShape, BlendShapeChannel, BlendShapeManager, ChannelCategory};
pub use blink::Blinker;
pub use clip::{AnimationClip, BoneTrack, Interpolation, Keyframe, PoseChannel};
pub use commands::{AnimationCommand, Command, EmotionCommand};
pub use config::{
    BlendShapeConfig, BlinkConfig, Config, LipsyncConfig, PlayerConfig, SessionConfig,
};
pub use error::{AvatarError, AvatarResult};
pub use host::{
    apply_frame, apply_natural_pose, ApplyReport, HeadlessMesh, HeadlessScene, MorphTargets,
    SceneHost,
};
pub use ids::{PlaybackId, TimerId};
pub use layers::{ActiveEntry, AnimationLayerPlayer, LayerInference, NamingRule, PriorityLayer};
pub use library::standard_clips;
pub use lipsync::{LipsyncFrame, LipsyncSmoother, Vowel};
pub use outputs::{AvatarEvent, FrameOutput, MorphWrite};
pub use pose::{BoneTransform, ChannelWrite, NaturalPose, Pose, PoseAccumulator};
pub use presets::{emotion_preset, EmotionPreset};
pub use runtime::{AvatarRuntime, DeferredAction};
pub use sampling::sample_track;
pub use scheduler::Scheduler;
pub use session::{KeyValueStore, MemoryStore, SessionSnapshot};
pub use state_machine::{BehaviorState, BehaviorStateMachine};
