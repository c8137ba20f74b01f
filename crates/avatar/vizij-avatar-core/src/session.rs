//! Session persistence over a string key-value store (browser local storage or
//! an in-memory map). Timestamps are supplied by the caller in milliseconds.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AvatarError, AvatarResult};
use crate::pose::NaturalPose;
use crate::state_machine::BehaviorState;

pub const SESSION_KEY: &str = "vrm_overlay_state";
pub const NATURAL_POSE_KEY: &str = "naturalPose";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> AvatarResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> AvatarResult<()>;
    fn remove(&mut self, key: &str) -> AvatarResult<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> AvatarResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> AvatarResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> AvatarResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Last behavior/emotion snapshot for resuming a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    #[serde(default)]
    pub state: BehaviorState,
    #[serde(rename = "currentMovement", default)]
    pub movement: Option<String>,
    #[serde(rename = "currentEmotion", default)]
    pub emotion: Option<String>,
}

pub fn save_snapshot<S: KeyValueStore + ?Sized>(
    store: &mut S,
    snapshot: &SessionSnapshot,
) -> AvatarResult<()> {
    let json = serde_json::to_string(snapshot).map_err(|e| AvatarError::Store(e.to_string()))?;
    store.set(SESSION_KEY, &json)
}

/// Load the stored snapshot if it is younger than `max_age_ms`. Expired or
/// unreadable snapshots are deleted and reported as `None`.
pub fn restore_snapshot<S: KeyValueStore + ?Sized>(
    store: &mut S,
    now_ms: u64,
    max_age_ms: u64,
) -> AvatarResult<Option<SessionSnapshot>> {
    let Some(raw) = store.get(SESSION_KEY)? else {
        return Ok(None);
    };
    let snapshot: SessionSnapshot = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            warn!("discarding unreadable session snapshot: {e}");
            store.remove(SESSION_KEY)?;
            return Ok(None);
        }
    };
    let age = now_ms.saturating_sub(snapshot.timestamp_ms);
    if age >= max_age_ms {
        debug!("session snapshot expired ({age} ms old)");
        store.remove(SESSION_KEY)?;
        return Ok(None);
    }
    Ok(Some(snapshot))
}

pub fn save_natural_pose<S: KeyValueStore + ?Sized>(
    store: &mut S,
    pose: &NaturalPose,
) -> AvatarResult<()> {
    let json = serde_json::to_string(pose).map_err(|e| AvatarError::Store(e.to_string()))?;
    store.set(NATURAL_POSE_KEY, &json)
}

pub fn load_natural_pose<S: KeyValueStore + ?Sized>(
    store: &S,
) -> AvatarResult<Option<NaturalPose>> {
    match store.get(NATURAL_POSE_KEY)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AvatarError::Store(format!("{NATURAL_POSE_KEY}: {e}"))),
        None => Ok(None),
    }
}

/// Forget the saved pose and return the built-in default.
pub fn reset_natural_pose<S: KeyValueStore + ?Sized>(store: &mut S) -> AvatarResult<NaturalPose> {
    store.remove(NATURAL_POSE_KEY)?;
    Ok(NaturalPose::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::PoseChannel;

    fn snap(ts: u64) -> SessionSnapshot {
        SessionSnapshot {
            timestamp_ms: ts,
            state: BehaviorState::Talking,
            movement: Some("talking".into()),
            emotion: Some("happy".into()),
        }
    }

    #[test]
    fn fresh_snapshot_restores() {
        let mut store = MemoryStore::new();
        save_snapshot(&mut store, &snap(1_000)).unwrap();
        let got = restore_snapshot(&mut store, 61_000, 300_000).unwrap();
        assert_eq!(got, Some(snap(1_000)));
    }

    #[test]
    fn expired_snapshot_is_deleted() {
        let mut store = MemoryStore::new();
        save_snapshot(&mut store, &snap(0)).unwrap();
        assert_eq!(restore_snapshot(&mut store, 300_000, 300_000).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn original_key_names_parse() {
        let mut store = MemoryStore::new();
        store
            .set(
                SESSION_KEY,
                r#"{"timestamp":5,"currentMovement":"idle","currentEmotion":null,"cameraDistance":2.0}"#,
            )
            .unwrap();
        let got = restore_snapshot(&mut store, 10, 300_000).unwrap().unwrap();
        assert_eq!(got.movement.as_deref(), Some("idle"));
        assert_eq!(got.emotion, None);
        assert_eq!(got.state, BehaviorState::Idle);
    }

    #[test]
    fn garbage_snapshot_is_discarded() {
        let mut store = MemoryStore::new();
        store.set(SESSION_KEY, "{oops").unwrap();
        assert_eq!(restore_snapshot(&mut store, 0, 300_000).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn natural_pose_round_trip_and_reset() {
        let mut store = MemoryStore::new();
        assert_eq!(load_natural_pose(&store).unwrap(), None);
        let mut pose = NaturalPose::default();
        pose.set_rotation_axis("J_Bip_L_UpperArm", PoseChannel::RotationZ, 1.1);
        save_natural_pose(&mut store, &pose).unwrap();
        assert_eq!(load_natural_pose(&store).unwrap(), Some(pose));
        assert_eq!(reset_natural_pose(&mut store).unwrap(), NaturalPose::default());
        assert_eq!(load_natural_pose(&store).unwrap(), None);
    }
}
