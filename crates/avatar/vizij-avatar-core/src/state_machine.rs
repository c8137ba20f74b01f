//! Behavior state machine gating which procedural clip plays.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, AvatarResult};
use crate::layers::AnimationLayerPlayer;
use crate::outputs::AvatarEvent;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorState {
    #[default]
    Idle,
    Talking,
    Thinking,
    Gesturing,
    Emotional,
    Listening,
}

impl BehaviorState {
    pub const ALL: [BehaviorState; 6] = [
        BehaviorState::Idle,
        BehaviorState::Talking,
        BehaviorState::Thinking,
        BehaviorState::Gesturing,
        BehaviorState::Emotional,
        BehaviorState::Listening,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Talking => "talking",
            BehaviorState::Thinking => "thinking",
            BehaviorState::Gesturing => "gesturing",
            BehaviorState::Emotional => "emotional",
            BehaviorState::Listening => "listening",
        }
    }

    /// Outgoing edges of the fixed allow-graph.
    pub fn allowed(self) -> &'static [BehaviorState] {
        use BehaviorState::*;
        match self {
            Idle => &[Talking, Thinking, Gesturing, Listening],
            Talking => &[Idle, Emotional, Gesturing],
            Thinking => &[Idle, Talking],
            Gesturing => &[Idle, Talking],
            Emotional => &[Idle, Talking],
            Listening => &[Idle, Talking],
        }
    }

    pub fn can_transition_to(self, to: BehaviorState) -> bool {
        self.allowed().contains(&to)
    }

    /// Clip the layer player runs while in this state.
    pub fn clip(self) -> &'static str {
        match self {
            BehaviorState::Idle => "idle",
            BehaviorState::Talking => "talking",
            BehaviorState::Thinking => "thinking_move",
            BehaviorState::Gesturing => "greeting",
            BehaviorState::Emotional => "excitement",
            BehaviorState::Listening => "listening",
        }
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorState::Idle => "Idle",
            BehaviorState::Talking => "Talking",
            BehaviorState::Thinking => "Thinking",
            BehaviorState::Gesturing => "Gesturing",
            BehaviorState::Emotional => "Emotional",
            BehaviorState::Listening => "Listening",
        };
        f.write_str(name)
    }
}

/// Case-insensitive; surrounding whitespace is ignored.
impl FromStr for BehaviorState {
    type Err = AvatarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        BehaviorState::ALL
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| AvatarError::UnknownState(s.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct BehaviorStateMachine {
    current: BehaviorState,
    previous: Option<BehaviorState>,
    events: Vec<AvatarEvent>,
}

impl BehaviorStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> BehaviorState {
        self.current
    }

    pub fn previous(&self) -> Option<BehaviorState> {
        self.previous
    }

    pub fn allowed(&self) -> &'static [BehaviorState] {
        self.current.allowed()
    }

    /// Move along an allow-graph edge and start the state's clip.
    /// The state changes even if the clip is missing; that failure is only logged.
    pub fn transition_to(
        &mut self,
        state: BehaviorState,
        blend_seconds: f32,
        player: &mut AnimationLayerPlayer,
    ) -> AvatarResult<()> {
        let from = self.current;
        if !from.can_transition_to(state) {
            warn!("illegal transition {from} -> {state}");
            return Err(AvatarError::IllegalTransition { from, to: state });
        }
        self.previous = Some(from);
        self.current = state;
        debug!("state {from} -> {state}");
        self.events
            .push(AvatarEvent::StateChanged { from, to: state });
        if let Err(e) = player.play(state.clip(), None, Some(blend_seconds)) {
            warn!("state {state}: {e}");
        }
        Ok(())
    }

    /// Transition back to the previous state. `Ok(false)` when there is none.
    pub fn revert_to_previous(
        &mut self,
        blend_seconds: f32,
        player: &mut AnimationLayerPlayer,
    ) -> AvatarResult<bool> {
        match self.previous {
            Some(prev) => self
                .transition_to(prev, blend_seconds, player)
                .map(|_| true),
            None => Ok(false),
        }
    }

    pub fn drain_events(&mut self) -> Vec<AvatarEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Talking".parse::<BehaviorState>(), Ok(BehaviorState::Talking));
        assert_eq!(" LISTENING ".parse::<BehaviorState>(), Ok(BehaviorState::Listening));
        assert_eq!(
            "dancing".parse::<BehaviorState>(),
            Err(AvatarError::UnknownState("dancing".into()))
        );
    }

    #[test]
    fn graph_is_directed() {
        assert!(BehaviorState::Talking.can_transition_to(BehaviorState::Emotional));
        assert!(!BehaviorState::Idle.can_transition_to(BehaviorState::Emotional));
        assert!(!BehaviorState::Idle.can_transition_to(BehaviorState::Idle));
        for st in BehaviorState::ALL {
            assert!(!st.allowed().is_empty());
        }
    }

    #[test]
    fn transition_without_clip_still_changes_state() {
        let mut player = AnimationLayerPlayer::new(PlayerConfig::default());
        let mut sm = BehaviorStateMachine::new();
        sm.transition_to(BehaviorState::Thinking, 0.5, &mut player)
            .unwrap();
        assert_eq!(sm.current(), BehaviorState::Thinking);
        assert_eq!(sm.previous(), Some(BehaviorState::Idle));
        assert!(player.active_list().is_empty());
        assert_eq!(
            sm.drain_events(),
            vec![AvatarEvent::StateChanged {
                from: BehaviorState::Idle,
                to: BehaviorState::Thinking
            }]
        );
    }

    #[test]
    fn revert_without_previous_is_noop() {
        let mut player = AnimationLayerPlayer::new(PlayerConfig::default());
        let mut sm = BehaviorStateMachine::new();
        assert_eq!(sm.revert_to_previous(0.5, &mut player), Ok(false));
        assert_eq!(sm.current(), BehaviorState::Idle);
    }
}
