//! Blend-shape (morph channel) store and manager.
//!
//! Channels are independent: any number can be non-zero at once. A channel's
//! priority is reporting metadata only and never gates another channel.
//! Transitions are eased (quadratic ease-out) from the current value to the
//! new target and advance only from `tick`.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::BlendShapeConfig;
use crate::error::{AvatarError, AvatarResult};
use crate::interp::ease_out_quad;
use crate::lipsync::{LipsyncFrame, Vowel};
use crate::outputs::{AvatarEvent, MorphWrite};
use crate::presets::emotion_preset;

pub const EMOTION_CHANNELS: [&str; 4] = ["Fcl_HAP_HAP", "Fcl_SAD_SAD", "Fcl_ANG_ANG", "Fcl_SUR_SUR"];
pub const LIPSYNC_CHANNELS: [&str; 5] = ["Fcl_MTH_A", "Fcl_MTH_I", "Fcl_MTH_U", "Fcl_MTH_E", "Fcl_MTH_O"];
pub const BLINK_CHANNELS: [&str; 1] = ["Fcl_EYE_Close"];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCategory {
    Emotion,
    Lipsync,
    Blink,
    Custom,
}

impl ChannelCategory {
    pub fn of(name: &str) -> Self {
        if EMOTION_CHANNELS.contains(&name) {
            ChannelCategory::Emotion
        } else if LIPSYNC_CHANNELS.contains(&name) {
            ChannelCategory::Lipsync
        } else if BLINK_CHANNELS.contains(&name) {
            ChannelCategory::Blink
        } else {
            ChannelCategory::Custom
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Transition {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlendShapeChannel {
    pub name: String,
    pub current: f32,
    pub target: f32,
    pub priority: i32,
    transition: Option<Transition>,
}

impl BlendShapeChannel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: 0.0,
            target: 0.0,
            priority: 0,
            transition: None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn category(&self) -> ChannelCategory {
        ChannelCategory::of(&self.name)
    }

    fn advance(&mut self, dt: f32) {
        let Some(tr) = self.transition.as_mut() else {
            return;
        };
        tr.elapsed += dt;
        let t = if tr.duration > 0.0 {
            (tr.elapsed / tr.duration).min(1.0)
        } else {
            1.0
        };
        if t >= 1.0 {
            self.current = tr.to;
            self.transition = None;
        } else {
            self.current = (tr.from + (tr.to - tr.from) * ease_out_quad(t)).clamp(0.0, 1.0);
        }
    }
}

/// Row returned by [`BlendShapeManager::active_channels`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveShape {
    pub name: String,
    /// Target the channel is heading to.
    pub value: f32,
    pub current: f32,
    pub priority: i32,
}

#[derive(Debug)]
pub struct BlendShapeManager {
    cfg: BlendShapeConfig,
    channels: BTreeMap<String, BlendShapeChannel>,
    events: Vec<AvatarEvent>,
}

impl BlendShapeManager {
    pub fn new(cfg: BlendShapeConfig) -> Self {
        Self {
            cfg,
            channels: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &BlendShapeConfig {
        &self.cfg
    }

    /// Start an eased transition of `name` toward `target`.
    /// Returns false when the request falls inside the dead-zone of the
    /// channel's current target (nothing changes, priority included).
    pub fn set_channel(&mut self, name: &str, target: f32, priority: i32, seconds: f32) -> bool {
        if !target.is_finite() {
            warn!("blend shape '{name}': non-finite target ignored");
            return false;
        }
        let target = target.clamp(0.0, 1.0);
        let stored = self.channels.get(name).map(|c| c.target).unwrap_or(0.0);
        if (target - stored).abs() < self.cfg.dead_zone {
            return false;
        }
        let ch = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| BlendShapeChannel::new(name));
        if !seconds.is_finite() || seconds <= 0.0 {
            ch.current = target;
            ch.transition = None;
        } else {
            ch.transition = Some(Transition {
                from: ch.current,
                to: target,
                elapsed: 0.0,
                duration: seconds,
            });
        }
        ch.target = target;
        ch.priority = priority;
        true
    }

    pub fn apply_emotion(&mut self, emotion: &str, intensity: f32, priority: i32) -> AvatarResult<()> {
        let Some(preset) = emotion_preset(emotion) else {
            warn!("emotion '{emotion}' not found");
            return Err(AvatarError::UnknownEmotion(emotion.to_string()));
        };
        let seconds = self.cfg.emotion_transition_seconds;
        for (channel, value) in preset.channels {
            self.set_channel(channel, value * intensity, priority, seconds);
        }
        debug!("emotion '{}' at {intensity} (priority {priority})", preset.name);
        self.events.push(AvatarEvent::EmotionApplied {
            emotion: preset.name.to_string(),
            intensity,
            priority,
        });
        Ok(())
    }

    pub fn reset_emotions(&mut self) {
        let seconds = self.cfg.emotion_reset_seconds;
        for channel in EMOTION_CHANNELS {
            self.set_channel(channel, 0.0, 0, seconds);
        }
        debug!("emotions reset");
        self.events.push(AvatarEvent::EmotionsReset);
    }

    /// Write the five vowel channels from `frame` with a short transition.
    pub fn apply_lipsync(&mut self, frame: &LipsyncFrame, priority: i32) {
        let seconds = self.cfg.lipsync_transition_seconds;
        for vowel in Vowel::ALL {
            self.set_channel(vowel.channel(), frame.get(vowel), priority, seconds);
        }
    }

    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for ch in self.channels.values_mut() {
            ch.advance(dt);
        }
    }

    /// Channels targeting a value above the dead-zone, highest priority first.
    pub fn active_channels(&self) -> Vec<ActiveShape> {
        let mut out: Vec<ActiveShape> = self
            .channels
            .values()
            .filter(|c| c.target > self.cfg.dead_zone)
            .map(|c| ActiveShape {
                name: c.name.clone(),
                value: c.target,
                current: c.current,
                priority: c.priority,
            })
            .collect();
        out.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        out
    }

    /// Drive every channel to 0 and reset priority bookkeeping.
    pub fn clear_all(&mut self) {
        let seconds = self.cfg.clear_seconds;
        let names: Vec<String> = self.channels.keys().cloned().collect();
        for name in names {
            self.set_channel(&name, 0.0, 0, seconds);
        }
        for ch in self.channels.values_mut() {
            ch.priority = 0;
        }
    }

    pub fn channel(&self, name: &str) -> Option<&BlendShapeChannel> {
        self.channels.get(name)
    }

    pub fn value(&self, name: &str) -> f32 {
        self.channels.get(name).map(|c| c.current).unwrap_or(0.0)
    }

    pub fn target(&self, name: &str) -> f32 {
        self.channels.get(name).map(|c| c.target).unwrap_or(0.0)
    }

    /// Current value of every known channel, ordered by name.
    pub fn values(&self) -> Vec<MorphWrite> {
        self.channels
            .values()
            .map(|c| MorphWrite {
                name: c.name.clone(),
                value: c.current,
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<AvatarEvent> {
        std::mem::take(&mut self.events)
    }
}
