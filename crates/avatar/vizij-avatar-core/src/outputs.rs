//! Output contracts from the avatar core.
//!
//! A frame carries the blended skeletal channel writes, the morph channel values
//! and the semantic events raised since the previous frame. Adapters (wasm/host)
//! apply the writes and forward the events.

use serde::{Deserialize, Serialize};

use crate::ids::PlaybackId;
use crate::layers::PriorityLayer;
use crate::pose::Pose;
use crate::state_machine::BehaviorState;

/// One morph channel weight for this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MorphWrite {
    pub name: String,
    pub value: f32,
}

/// Discrete semantic signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum AvatarEvent {
    PlaybackStarted {
        playback: PlaybackId,
        clip: String,
        layer: PriorityLayer,
    },
    /// Same clip played again on its layer; fade-in restarted.
    PlaybackRetriggered {
        playback: PlaybackId,
        clip: String,
        layer: PriorityLayer,
    },
    PlaybackFadingOut {
        playback: PlaybackId,
        clip: String,
        layer: PriorityLayer,
    },
    PlaybackRemoved {
        playback: PlaybackId,
        clip: String,
    },
    StateChanged {
        from: BehaviorState,
        to: BehaviorState,
    },
    EmotionApplied {
        emotion: String,
        intensity: f32,
        priority: i32,
    },
    EmotionsReset,
    Blink,
    /// An incoming event was rejected; the reason is the error text.
    CommandRejected {
        reason: String,
    },
}

/// Everything a host needs to render one frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameOutput {
    /// Monotonic frame counter.
    pub epoch: u64,
    #[serde(default)]
    pub pose: Pose,
    #[serde(default)]
    pub morphs: Vec<MorphWrite>,
    #[serde(default)]
    pub events: Vec<AvatarEvent>,
}

impl FrameOutput {
    #[inline]
    pub fn clear(&mut self) {
        self.pose.writes.clear();
        self.morphs.clear();
        self.events.clear();
    }

    pub fn morph(&self, name: &str) -> Option<f32> {
        self.morphs.iter().find(|m| m.name == name).map(|m| m.value)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pose.is_empty() && self.morphs.is_empty() && self.events.is_empty()
    }
}
