//! Priority-layered clip player.
//!
//! Four fixed layers (BASE < MOVEMENT < GESTURE < EMERGENCY). Each layer holds at
//! most one occupant playback. Starting a clip on layer R fades out every occupant
//! on a layer <= R; fading playbacks keep rendering at a decaying weight until
//! their removal timer fires. Removals are keyed by [`PlaybackId`], so a clip that
//! is re-played during its own fade-out starts a fresh playback and the old one
//! still goes away on schedule.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clip::AnimationClip;
use crate::config::PlayerConfig;
use crate::error::{AvatarError, AvatarResult};
use crate::ids::{IdAllocator, PlaybackId, TimerId};
use crate::interp::functions::fmod;
use crate::outputs::AvatarEvent;
use crate::pose::{NaturalPose, Pose, PoseAccumulator};
use crate::sampling::sample_track;
use crate::scheduler::Scheduler;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityLayer {
    Base = 0,
    Movement = 1,
    Gesture = 2,
    Emergency = 3,
}

impl PriorityLayer {
    pub const ALL: [PriorityLayer; 4] = [
        PriorityLayer::Base,
        PriorityLayer::Movement,
        PriorityLayer::Gesture,
        PriorityLayer::Emergency,
    ];

    #[inline]
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }
}

/// Substring rule mapping clip names to a default layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamingRule {
    pub needle: String,
    pub layer: PriorityLayer,
}

impl NamingRule {
    pub fn new(needle: &str, layer: PriorityLayer) -> Self {
        Self {
            needle: needle.to_string(),
            layer,
        }
    }
}

/// Ordered naming-convention table; the first matching rule wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerInference {
    pub rules: Vec<NamingRule>,
    pub fallback: PriorityLayer,
}

impl Default for LayerInference {
    fn default() -> Self {
        Self {
            rules: vec![
                NamingRule::new("idle", PriorityLayer::Base),
                NamingRule::new("breathing", PriorityLayer::Base),
                NamingRule::new("greeting", PriorityLayer::Gesture),
                NamingRule::new("surprise", PriorityLayer::Gesture),
            ],
            fallback: PriorityLayer::Movement,
        }
    }
}

impl LayerInference {
    pub fn infer(&self, name: &str) -> PriorityLayer {
        self.rules
            .iter()
            .find(|r| name.contains(r.needle.as_str()))
            .map(|r| r.layer)
            .unwrap_or(self.fallback)
    }
}

#[derive(Clone, Debug)]
struct RegisteredClip {
    clip: AnimationClip,
    layer: PriorityLayer,
}

#[derive(Clone, Copy, Debug)]
struct FadeOut {
    from_weight: f32,
    started_at: f64,
    duration: f32,
    timer: TimerId,
}

/// A clip playing (or fading out) on a layer.
#[derive(Clone, Debug)]
struct ActivePlayback {
    id: PlaybackId,
    clip: String,
    layer: PriorityLayer,
    /// Seconds played since the playback was created (not wrapped).
    elapsed: f64,
    /// Player clock when the current fade-in began.
    fade_in_from: f64,
    blend_in: f32,
    fade_out: Option<FadeOut>,
}

impl ActivePlayback {
    fn weight(&self, clock: f64) -> f32 {
        if let Some(f) = self.fade_out {
            if f.duration <= 0.0 {
                return 0.0;
            }
            let t = ((clock - f.started_at) as f32 / f.duration).clamp(0.0, 1.0);
            return f.from_weight * (1.0 - t);
        }
        if self.blend_in <= 0.0 {
            return 1.0;
        }
        ((clock - self.fade_in_from) as f32 / self.blend_in).clamp(0.0, 1.0)
    }
}

/// Snapshot row returned by [`AnimationLayerPlayer::active_list`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveEntry {
    pub playback: PlaybackId,
    pub name: String,
    pub layer: PriorityLayer,
    pub elapsed: f64,
    pub weight: f32,
    /// True while the playback is in its fade-out grace window.
    pub fading: bool,
}

#[derive(Debug)]
pub struct AnimationLayerPlayer {
    cfg: PlayerConfig,
    inference: LayerInference,
    clips: HashMap<String, RegisteredClip>,
    layers: BTreeMap<PriorityLayer, ActivePlayback>,
    fading: Vec<ActivePlayback>,
    removals: Scheduler<PlaybackId>,
    ids: IdAllocator,
    clock: f64,
    events: Vec<AvatarEvent>,
}

impl AnimationLayerPlayer {
    pub fn new(cfg: PlayerConfig) -> Self {
        Self::with_inference(cfg, LayerInference::default())
    }

    pub fn with_inference(cfg: PlayerConfig, inference: LayerInference) -> Self {
        Self {
            cfg,
            inference,
            clips: HashMap::new(),
            layers: BTreeMap::new(),
            fading: Vec::new(),
            removals: Scheduler::new(),
            ids: IdAllocator::new(),
            clock: 0.0,
            events: Vec::new(),
        }
    }

    pub fn inference(&self) -> &LayerInference {
        &self.inference
    }

    /// Store a clip under `name`, overwriting any previous clip with that name.
    /// Without an explicit layer the naming table decides.
    pub fn register(
        &mut self,
        name: &str,
        clip: AnimationClip,
        default_layer: Option<PriorityLayer>,
    ) -> AvatarResult<PriorityLayer> {
        clip.validate()?;
        let layer = default_layer.unwrap_or_else(|| self.inference.infer(name));
        debug!("registered clip '{name}' on {layer:?}");
        self.clips
            .insert(name.to_string(), RegisteredClip { clip, layer });
        Ok(layer)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.get(name).map(|r| &r.clip)
    }

    /// Default layer a clip was registered with.
    pub fn default_layer(&self, name: &str) -> Option<PriorityLayer> {
        self.clips.get(name).map(|r| r.layer)
    }

    pub fn clip_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clips.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start `name` on its resolved layer, preempting every occupant at or below it.
    pub fn play(
        &mut self,
        name: &str,
        layer_override: Option<PriorityLayer>,
        blend_seconds: Option<f32>,
    ) -> AvatarResult<PlaybackId> {
        let Some(reg) = self.clips.get(name) else {
            warn!("play: animation '{name}' is not registered");
            return Err(AvatarError::UnknownAnimation(name.to_string()));
        };
        let layer = layer_override.unwrap_or(reg.layer);
        let blend = blend_seconds
            .or(reg.clip.blend_seconds)
            .unwrap_or(self.cfg.default_blend_seconds)
            .max(0.0);

        let retrigger = self
            .layers
            .get(&layer)
            .map(|p| p.clip == name)
            .unwrap_or(false);

        let preempted: Vec<PriorityLayer> = self
            .layers
            .range(..=layer)
            .map(|(l, _)| *l)
            .filter(|l| !(retrigger && *l == layer))
            .collect();
        for l in preempted {
            if let Some(p) = self.layers.remove(&l) {
                debug!("'{}' on {:?} preempted by '{name}'", p.clip, l);
                self.begin_fade_out(p);
            }
        }

        if retrigger {
            if let Some(p) = self.layers.get_mut(&layer) {
                p.fade_in_from = self.clock;
                p.blend_in = blend;
                self.events.push(AvatarEvent::PlaybackRetriggered {
                    playback: p.id,
                    clip: p.clip.clone(),
                    layer,
                });
                return Ok(p.id);
            }
        }

        let id = self.ids.alloc_playback();
        self.layers.insert(
            layer,
            ActivePlayback {
                id,
                clip: name.to_string(),
                layer,
                elapsed: 0.0,
                fade_in_from: self.clock,
                blend_in: blend,
                fade_out: None,
            },
        );
        debug!("playing '{name}' on {layer:?} (blend {blend}s)");
        self.events.push(AvatarEvent::PlaybackStarted {
            playback: id,
            clip: name.to_string(),
            layer,
        });
        Ok(id)
    }

    /// Fade out the occupant playing `name` (highest layer first).
    /// `Ok(false)` when the clip is registered but not currently playing.
    pub fn stop(&mut self, name: &str) -> AvatarResult<bool> {
        if !self.clips.contains_key(name) {
            warn!("stop: animation '{name}' is not registered");
            return Err(AvatarError::UnknownAnimation(name.to_string()));
        }
        let layer = self
            .layers
            .iter()
            .rev()
            .find(|(_, p)| p.clip == name)
            .map(|(l, _)| *l);
        match layer.and_then(|l| self.layers.remove(&l)) {
            Some(p) => {
                self.begin_fade_out(p);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn stop_all(&mut self) {
        let all = std::mem::take(&mut self.layers);
        for (_, p) in all {
            self.begin_fade_out(p);
        }
    }

    /// Fade out whatever occupies `layer`. Returns false if it was empty.
    pub fn clear_layer(&mut self, layer: PriorityLayer) -> bool {
        match self.layers.remove(&layer) {
            Some(p) => {
                self.begin_fade_out(p);
                true
            }
            None => false,
        }
    }

    fn begin_fade_out(&mut self, mut p: ActivePlayback) {
        let duration = self.cfg.fade_out_seconds.max(0.0);
        let from_weight = p.weight(self.clock);
        let timer = self
            .removals
            .schedule_at(self.clock + f64::from(duration), p.id);
        p.fade_out = Some(FadeOut {
            from_weight,
            started_at: self.clock,
            duration,
            timer,
        });
        self.events.push(AvatarEvent::PlaybackFadingOut {
            playback: p.id,
            clip: p.clip.clone(),
            layer: p.layer,
        });
        self.fading.push(p);
    }

    /// Advance playback time and fades; remove playbacks whose grace window elapsed.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { f64::from(dt.max(0.0)) } else { 0.0 };
        self.clock += dt;
        for p in self.layers.values_mut() {
            p.elapsed += dt;
        }
        for p in &mut self.fading {
            p.elapsed += dt;
        }
        for (timer, id) in self.removals.take_due(self.clock) {
            let pos = self.fading.iter().position(|p| {
                p.id == id && p.fade_out.map(|f| f.timer == timer).unwrap_or(false)
            });
            if let Some(pos) = pos {
                let p = self.fading.remove(pos);
                debug!("removed '{}' ({:?})", p.clip, p.id);
                self.events.push(AvatarEvent::PlaybackRemoved {
                    playback: p.id,
                    clip: p.clip,
                });
            }
        }
    }

    /// Audible playbacks, highest layer first. Fading playbacks are listed until
    /// removed, unless the same clip is occupying a layer again.
    pub fn active_list(&self) -> Vec<ActiveEntry> {
        let mut out: Vec<ActiveEntry> = self
            .layers
            .values()
            .map(|p| self.entry(p, false))
            .collect();
        for p in &self.fading {
            if self.layers.values().any(|o| o.clip == p.clip) {
                continue;
            }
            out.push(self.entry(p, true));
        }
        out.sort_by(|a, b| {
            b.layer
                .cmp(&a.layer)
                .then(a.fading.cmp(&b.fading))
                .then(b.playback.cmp(&a.playback))
        });
        out
    }

    fn entry(&self, p: &ActivePlayback, fading: bool) -> ActiveEntry {
        ActiveEntry {
            playback: p.id,
            name: p.clip.clone(),
            layer: p.layer,
            elapsed: p.elapsed,
            weight: p.weight(self.clock),
            fading,
        }
    }

    /// True while some layer is occupied by `name` (fading playbacks do not count).
    pub fn is_playing(&self, name: &str) -> bool {
        self.layers.values().any(|p| p.clip == name)
    }

    pub fn occupant(&self, layer: PriorityLayer) -> Option<&str> {
        self.layers.get(&layer).map(|p| p.clip.as_str())
    }

    /// Name of the occupant on the highest occupied layer.
    pub fn top_clip(&self) -> Option<&str> {
        self.layers.values().next_back().map(|p| p.clip.as_str())
    }

    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Blend every audible playback into a pose over `rest`.
    pub fn sample_pose(&self, rest: &NaturalPose) -> Pose {
        let mut acc = PoseAccumulator::new();
        for p in self.layers.values().chain(self.fading.iter()) {
            let w = p.weight(self.clock);
            if w <= 0.0 {
                continue;
            }
            let Some(reg) = self.clips.get(&p.clip) else {
                continue;
            };
            let t = fmod(p.elapsed, f64::from(reg.clip.duration)) as f32;
            for track in &reg.clip.tracks {
                acc.add(&track.bone, track.channel, sample_track(track, t), w);
            }
        }
        acc.finalize(rest)
    }

    pub fn drain_events(&mut self) -> Vec<AvatarEvent> {
        std::mem::take(&mut self.events)
    }
}
