//! AvatarRuntime: the update-loop coordinator and the single context object
//! owning every subsystem.
//!
//! Per frame (`update`):
//! 1. advance the clock and fire due deferred actions (emotion reset, revert to idle, session replay)
//! 2. tick the layer player
//! 3. tick the lip-sync smoother and feed its shaped frame to the blend-shape manager
//! 4. tick the blinker, then the blend-shape transitions
//! 5. sample the pose; channels that stopped animating get their rest value written once
//! 6. collect morph values and drain events into the frame
//!
//! Command handlers and operator calls only change targets and schedules; nothing
//! they do is visible until the next `update`.

use std::collections::BTreeSet;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::blend_shape::{ActiveShape, BlendShapeManager};
use crate::blink::Blinker;
use crate::clip::{AnimationClip, PoseChannel};
use crate::commands::{AnimationCommand, Command, EmotionCommand};
use crate::config::Config;
use crate::error::{AvatarError, AvatarResult};
use crate::host::{apply_frame, ApplyReport, SceneHost};
use crate::ids::{PlaybackId, TimerId};
use crate::layers::{ActiveEntry, AnimationLayerPlayer, PriorityLayer};
use crate::library::standard_clips;
use crate::lipsync::{LipsyncFrame, LipsyncSmoother};
use crate::outputs::{AvatarEvent, FrameOutput};
use crate::pose::{ChannelWrite, NaturalPose};
use crate::scheduler::Scheduler;
use crate::session::{self, KeyValueStore, SessionSnapshot};
use crate::state_machine::{BehaviorState, BehaviorStateMachine};

const IDLE_CLIP: &str = "idle";
const TALKING_CLIP: &str = "talking";

/// Work scheduled on the runtime clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeferredAction {
    ResetEmotions,
    PlayMovement(String),
    ApplyEmotion(String),
}

#[inline]
fn ms_to_s(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[derive(Debug)]
pub struct AvatarRuntime {
    cfg: Config,
    player: AnimationLayerPlayer,
    shapes: BlendShapeManager,
    lipsync: LipsyncSmoother,
    blinker: Blinker,
    states: BehaviorStateMachine,
    natural_pose: NaturalPose,
    natural_pose_dirty: bool,

    timers: Scheduler<DeferredAction>,
    emotion_reset: Option<TimerId>,
    animation_revert: Option<TimerId>,
    clock: f64,

    current_movement: Option<String>,
    current_emotion: Option<String>,
    /// Channels the previous frame animated.
    animated: BTreeSet<(String, PoseChannel)>,
    events: Vec<AvatarEvent>,
    frame: FrameOutput,
}

impl Default for AvatarRuntime {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AvatarRuntime {
    pub fn new(cfg: Config) -> Self {
        Self {
            player: AnimationLayerPlayer::new(cfg.player.clone()),
            shapes: BlendShapeManager::new(cfg.blend_shapes.clone()),
            lipsync: LipsyncSmoother::new(cfg.lipsync.clone()),
            blinker: Blinker::new(cfg.blink.clone()),
            states: BehaviorStateMachine::new(),
            natural_pose: NaturalPose::default(),
            natural_pose_dirty: true,
            timers: Scheduler::new(),
            emotion_reset: None,
            animation_revert: None,
            clock: 0.0,
            current_movement: None,
            current_emotion: None,
            animated: BTreeSet::new(),
            events: Vec::new(),
            frame: FrameOutput::default(),
            cfg,
        }
    }

    /// Register the built-in procedural clips.
    pub fn with_standard_clips(mut self) -> Self {
        for clip in standard_clips() {
            if let Err(e) = self.register_clip(clip, None) {
                warn!("built-in clip rejected: {e}");
            }
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn player(&self) -> &AnimationLayerPlayer {
        &self.player
    }

    pub fn blend_shapes(&self) -> &BlendShapeManager {
        &self.shapes
    }

    pub fn lipsync(&self) -> &LipsyncSmoother {
        &self.lipsync
    }

    pub fn blinker_mut(&mut self) -> &mut Blinker {
        &mut self.blinker
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Register (or replace) a clip under its own name.
    pub fn register_clip(
        &mut self,
        clip: AnimationClip,
        default_layer: Option<PriorityLayer>,
    ) -> AvatarResult<PriorityLayer> {
        let name = clip.name.clone();
        self.player.register(&name, clip, default_layer)
    }

    // ---- Command Source ----

    /// Apply one decoded command. Failures are logged, reported as a
    /// `CommandRejected` event and returned; runtime state is untouched by them.
    pub fn handle_command(&mut self, cmd: Command) -> AvatarResult<()> {
        let result = self.dispatch(cmd);
        if let Err(e) = &result {
            self.events.push(AvatarEvent::CommandRejected {
                reason: e.to_string(),
            });
        }
        result
    }

    pub fn handle_command_json(&mut self, json: &str) -> AvatarResult<()> {
        match Command::from_json(json) {
            Ok(cmd) => self.handle_command(cmd),
            Err(e) => {
                warn!("undecodable command: {e}");
                self.events.push(AvatarEvent::CommandRejected {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) -> AvatarResult<()> {
        match cmd {
            Command::Emotion(EmotionCommand {
                emotion,
                intensity,
                duration,
                priority,
            }) => {
                self.apply_emotion_with(&emotion, intensity, priority)?;
                if let Some(id) = self.emotion_reset.take() {
                    self.timers.cancel(id);
                }
                let duration = duration.unwrap_or(self.cfg.blend_shapes.emotion_reset_ms);
                if duration > 0 {
                    let due = self.clock + ms_to_s(duration);
                    self.emotion_reset =
                        Some(self.timers.schedule_at(due, DeferredAction::ResetEmotions));
                }
                Ok(())
            }
            Command::Animation(AnimationCommand {
                animation,
                duration,
            }) => {
                self.play_movement(&animation)?;
                if let Some(id) = self.animation_revert.take() {
                    self.timers.cancel(id);
                }
                let duration = duration.unwrap_or(self.cfg.player.animation_revert_ms);
                if duration > 0 {
                    let due = self.clock + ms_to_s(duration);
                    self.animation_revert = Some(self.timers.schedule_at(
                        due,
                        DeferredAction::PlayMovement(IDLE_CLIP.to_string()),
                    ));
                }
                Ok(())
            }
            Command::Status { status } => {
                let state: BehaviorState = status.parse().map_err(|e| {
                    warn!("status '{status}' is not a behavior state");
                    e
                })?;
                self.transition_to(state)
            }
            Command::Lipsync(frame) => {
                self.set_lipsync(&frame);
                Ok(())
            }
            Command::Speech { is_speaking, text } => {
                if let Some(text) = text {
                    trace!("speech text: {text}");
                }
                let clip = if is_speaking { TALKING_CLIP } else { IDLE_CLIP };
                self.play_movement(clip).map(|_| ())
            }
            Command::PoseControl { bone, axis, value } => {
                self.set_bone_rotation(&bone, &axis, value)
            }
            Command::Pong | Command::ClientAck => {
                trace!("keep-alive");
                Ok(())
            }
            Command::Unrecognized { kind } => {
                warn!("unrecognized command kind '{kind}'");
                Ok(())
            }
        }
    }

    // ---- Operator UI ----

    pub fn play_movement(&mut self, name: &str) -> AvatarResult<PlaybackId> {
        let id = self.player.play(name, None, None)?;
        self.current_movement = Some(name.to_string());
        Ok(id)
    }

    pub fn stop_movement(&mut self, name: &str) -> AvatarResult<bool> {
        let stopped = self.player.stop(name)?;
        if stopped && self.current_movement.as_deref() == Some(name) {
            self.current_movement = None;
        }
        Ok(stopped)
    }

    pub fn stop_all_movements(&mut self) {
        self.player.stop_all();
        self.current_movement = None;
    }

    /// Apply an emotion preset at full intensity and the configured priority.
    pub fn apply_emotion(&mut self, name: &str) -> AvatarResult<()> {
        let priority = self.cfg.blend_shapes.emotion_priority;
        self.apply_emotion_with(name, 1.0, priority)
    }

    pub fn apply_emotion_with(
        &mut self,
        name: &str,
        intensity: f32,
        priority: i32,
    ) -> AvatarResult<()> {
        self.shapes.apply_emotion(name, intensity, priority)?;
        self.current_emotion = Some(name.to_string());
        Ok(())
    }

    pub fn reset_emotions(&mut self) {
        if let Some(id) = self.emotion_reset.take() {
            self.timers.cancel(id);
        }
        self.shapes.reset_emotions();
        self.current_emotion = None;
    }

    pub fn clear_blend_shapes(&mut self) {
        self.shapes.clear_all();
        self.lipsync.reset();
        self.current_emotion = None;
    }

    /// Set the latest lip-sync frame; the smoother picks it up on the next update.
    pub fn set_lipsync(&mut self, frame: &LipsyncFrame) {
        self.lipsync.receive(frame);
    }

    pub fn active_animations(&self) -> Vec<ActiveEntry> {
        self.player.active_list()
    }

    pub fn active_blend_shapes(&self) -> Vec<ActiveShape> {
        self.shapes.active_channels()
    }

    pub fn current_state(&self) -> BehaviorState {
        self.states.current()
    }

    pub fn previous_state(&self) -> Option<BehaviorState> {
        self.states.previous()
    }

    pub fn allowed_transitions(&self) -> Vec<BehaviorState> {
        self.states.allowed().to_vec()
    }

    pub fn transition_to(&mut self, state: BehaviorState) -> AvatarResult<()> {
        let blend = self.cfg.player.state_blend_seconds;
        self.states.transition_to(state, blend, &mut self.player)?;
        if self.player.is_playing(state.clip()) {
            self.current_movement = Some(state.clip().to_string());
        }
        Ok(())
    }

    pub fn revert_state(&mut self) -> AvatarResult<bool> {
        let blend = self.cfg.player.state_blend_seconds;
        let reverted = self.states.revert_to_previous(blend, &mut self.player)?;
        let clip = self.states.current().clip();
        if reverted && self.player.is_playing(clip) {
            self.current_movement = Some(clip.to_string());
        }
        Ok(reverted)
    }

    pub fn manual_blink(&mut self) {
        self.blinker.trigger(&mut self.shapes);
        self.events.push(AvatarEvent::Blink);
    }

    /// Set one rest rotation axis (`x`, `y`, `z`) of a bone.
    pub fn set_bone_rotation(&mut self, bone: &str, axis: &str, value: f32) -> AvatarResult<()> {
        let channel = PoseChannel::rotation_axis(axis)
            .ok_or_else(|| AvatarError::Command(format!("unknown rotation axis '{axis}'")))?;
        if !value.is_finite() {
            return Err(AvatarError::Command(format!(
                "rotation for {bone}.{axis} must be finite"
            )));
        }
        debug!("pose {bone}.{axis} = {value}");
        self.natural_pose.set_rotation_axis(bone, channel, value);
        self.natural_pose_dirty = true;
        Ok(())
    }

    pub fn natural_pose(&self) -> &NaturalPose {
        &self.natural_pose
    }

    pub fn set_natural_pose(&mut self, pose: NaturalPose) {
        self.natural_pose = pose;
        self.natural_pose_dirty = true;
    }

    // ---- Frame ----

    /// Advance every subsystem by `dt` seconds and build the frame.
    pub fn update(&mut self, dt: f32) -> &FrameOutput {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.frame.clear();
        self.frame.epoch += 1;
        self.clock += f64::from(dt);

        for (id, action) in self.timers.take_due(self.clock) {
            if self.emotion_reset == Some(id) {
                self.emotion_reset = None;
            }
            if self.animation_revert == Some(id) {
                self.animation_revert = None;
            }
            self.run_deferred(action);
        }

        self.player.tick(dt);

        let mouth = self.lipsync.tick();
        let priority = self.cfg.blend_shapes.lipsync_priority;
        self.shapes.apply_lipsync(&mouth, priority);

        if self.blinker.tick(dt, &mut self.shapes) {
            self.events.push(AvatarEvent::Blink);
        }
        self.shapes.tick(dt);

        self.build_pose();
        self.frame.morphs = self.shapes.values();

        let mut events = std::mem::take(&mut self.events);
        events.extend(self.states.drain_events());
        events.extend(self.player.drain_events());
        events.extend(self.shapes.drain_events());
        self.frame.events = events;

        &self.frame
    }

    fn run_deferred(&mut self, action: DeferredAction) {
        debug!("deferred: {action:?}");
        let result = match action {
            DeferredAction::ResetEmotions => {
                self.shapes.reset_emotions();
                self.current_emotion = None;
                Ok(())
            }
            DeferredAction::PlayMovement(name) => self.play_movement(&name).map(|_| ()),
            DeferredAction::ApplyEmotion(name) => self.apply_emotion(&name),
        };
        if let Err(e) = result {
            warn!("deferred action failed: {e}");
        }
    }

    fn build_pose(&mut self) {
        let mut pose = self.player.sample_pose(&self.natural_pose);
        let live: BTreeSet<(String, PoseChannel)> = pose
            .writes
            .iter()
            .map(|w| (w.bone.clone(), w.channel))
            .collect();
        let mut written = live.clone();

        for (bone, channel) in self.animated.difference(&live) {
            pose.writes.push(ChannelWrite {
                bone: bone.clone(),
                channel: *channel,
                value: self.natural_pose.rest_value(bone, *channel),
            });
            written.insert((bone.clone(), *channel));
        }
        if self.natural_pose_dirty {
            for (bone, rotation) in &self.natural_pose.bones {
                for channel in [
                    PoseChannel::RotationX,
                    PoseChannel::RotationY,
                    PoseChannel::RotationZ,
                ] {
                    if written.insert((bone.clone(), channel)) {
                        pose.writes.push(ChannelWrite {
                            bone: bone.clone(),
                            channel,
                            value: rotation[channel.axis_index()],
                        });
                    }
                }
            }
            self.natural_pose_dirty = false;
        }
        pose.writes
            .sort_by(|a, b| a.bone.cmp(&b.bone).then(a.channel.cmp(&b.channel)));
        self.animated = live;
        self.frame.pose = pose;
    }

    /// Last frame built by `update`.
    pub fn frame(&self) -> &FrameOutput {
        &self.frame
    }

    pub fn apply_to_host<H: SceneHost + ?Sized>(&self, host: &mut H) -> ApplyReport {
        apply_frame(host, &self.frame)
    }

    // ---- Session ----

    pub fn snapshot(&self, now_ms: u64) -> SessionSnapshot {
        SessionSnapshot {
            timestamp_ms: now_ms,
            state: self.states.current(),
            movement: self.current_movement.clone(),
            emotion: self.current_emotion.clone(),
        }
    }

    /// Schedule replay of a snapshot's movement and emotion. Returns false (and
    /// does nothing) when the snapshot is too old.
    pub fn restore_snapshot(&mut self, snapshot: &SessionSnapshot, now_ms: u64) -> bool {
        let age = now_ms.saturating_sub(snapshot.timestamp_ms);
        if age >= self.cfg.session.max_age_ms {
            debug!("not restoring snapshot ({age} ms old)");
            return false;
        }
        if let Some(movement) = &snapshot.movement {
            let due = self.clock + ms_to_s(self.cfg.session.restore_movement_delay_ms);
            self.timers
                .schedule_at(due, DeferredAction::PlayMovement(movement.clone()));
        }
        if let Some(emotion) = &snapshot.emotion {
            let due = self.clock + ms_to_s(self.cfg.session.restore_emotion_delay_ms);
            self.timers
                .schedule_at(due, DeferredAction::ApplyEmotion(emotion.clone()));
        }
        true
    }

    pub fn save_session<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        now_ms: u64,
    ) -> AvatarResult<()> {
        session::save_snapshot(store, &self.snapshot(now_ms))
    }

    pub fn restore_session<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
        now_ms: u64,
    ) -> AvatarResult<bool> {
        let max_age = self.cfg.session.max_age_ms;
        match session::restore_snapshot(store, now_ms, max_age)? {
            Some(snapshot) => Ok(self.restore_snapshot(&snapshot, now_ms)),
            None => Ok(false),
        }
    }

    pub fn save_natural_pose<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> AvatarResult<()> {
        session::save_natural_pose(store, &self.natural_pose)
    }

    /// Load a saved natural pose if one exists. Returns whether one was found.
    pub fn load_natural_pose<S: KeyValueStore + ?Sized>(&mut self, store: &S) -> AvatarResult<bool> {
        match session::load_natural_pose(store)? {
            Some(pose) => {
                self.set_natural_pose(pose);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn reset_natural_pose<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) -> AvatarResult<()> {
        let pose = session::reset_natural_pose(store)?;
        self.set_natural_pose(pose);
        Ok(())
    }
}
