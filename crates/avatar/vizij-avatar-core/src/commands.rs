//! Command Source payloads.
//!
//! Messages are JSON objects discriminated by a `type` string. Known kinds decode
//! into [`Command`]; an unknown kind becomes [`Command::Unrecognized`] so the
//! caller can log it and move on. A known kind with a bad payload is an error.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{AvatarError, AvatarResult};
use crate::lipsync::LipsyncFrame;

fn default_intensity() -> f32 {
    1.0
}

fn default_emotion_priority() -> i32 {
    5
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionCommand {
    pub emotion: String,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Auto-reset delay in ms; 0 keeps the emotion. Unset uses the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default = "default_emotion_priority")]
    pub priority: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationCommand {
    pub animation: String,
    /// Auto-revert-to-idle delay in ms; 0 keeps the animation. Unset uses the
    /// configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Emotion(EmotionCommand),
    Animation(AnimationCommand),
    Status {
        status: String,
    },
    Lipsync(LipsyncFrame),
    Speech {
        #[serde(rename = "isSpeaking", alias = "is_speaking")]
        is_speaking: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Set one rest-pose rotation axis (`x`, `y` or `z`) of a bone, in radians.
    PoseControl {
        bone: String,
        axis: String,
        value: f32,
    },
    Pong,
    ClientAck,
    #[serde(skip)]
    Unrecognized {
        kind: String,
    },
}

const KNOWN_KINDS: &[&str] = &[
    "emotion",
    "animation",
    "status",
    "lipsync",
    "speech",
    "pose_control",
    "pong",
    "client_ack",
];

impl Command {
    pub fn from_json(s: &str) -> AvatarResult<Command> {
        let value: Json =
            serde_json::from_str(s).map_err(|e| AvatarError::Command(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Json) -> AvatarResult<Command> {
        let kind = value
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| AvatarError::Command("missing string field 'type'".into()))?
            .to_string();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            return Ok(Command::Unrecognized { kind });
        }
        serde_json::from_value(value).map_err(|e| AvatarError::Command(format!("{kind}: {e}")))
    }

    /// Wire name of this command's kind.
    pub fn kind(&self) -> &str {
        match self {
            Command::Emotion(_) => "emotion",
            Command::Animation(_) => "animation",
            Command::Status { .. } => "status",
            Command::Lipsync(_) => "lipsync",
            Command::Speech { .. } => "speech",
            Command::PoseControl { .. } => "pose_control",
            Command::Pong => "pong",
            Command::ClientAck => "client_ack",
            Command::Unrecognized { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_defaults() {
        let cmd = Command::from_json(r#"{ "type": "emotion", "emotion": "happy" }"#).unwrap();
        assert_eq!(
            cmd,
            Command::Emotion(EmotionCommand {
                emotion: "happy".into(),
                intensity: 1.0,
                duration: None,
                priority: 5,
            })
        );
    }

    #[test]
    fn animation_and_speech() {
        let cmd =
            Command::from_json(r#"{ "type": "animation", "animation": "greeting", "duration": 0 }"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::Animation(AnimationCommand {
                animation: "greeting".into(),
                duration: Some(0)
            })
        );
        let cmd = Command::from_json(r#"{ "type": "speech", "isSpeaking": true, "text": "hi" }"#)
            .unwrap();
        assert_eq!(
            cmd,
            Command::Speech {
                is_speaking: true,
                text: Some("hi".into())
            }
        );
    }

    #[test]
    fn lipsync_payload_is_flat() {
        let cmd = Command::from_json(r#"{ "type": "lipsync", "A": 0.7, "O": 0.1 }"#).unwrap();
        match cmd {
            Command::Lipsync(f) => {
                assert_eq!(f.a, 0.7);
                assert_eq!(f.o, 0.1);
                assert_eq!(f.energy, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_unrecognized_not_error() {
        let cmd = Command::from_json(r#"{ "type": "light_control", "action": "all" }"#).unwrap();
        assert_eq!(cmd.kind(), "light_control");
        assert!(matches!(cmd, Command::Unrecognized { .. }));
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            Command::from_json("not json"),
            Err(AvatarError::Command(_))
        ));
        assert!(Command::from_json(r#"{ "emotion": "happy" }"#).is_err());
        assert!(Command::from_json(r#"{ "type": "status" }"#).is_err());
    }
}
