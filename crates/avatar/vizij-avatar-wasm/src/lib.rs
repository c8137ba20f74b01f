//! wasm-bindgen surface for the avatar runtime.
//!
//! The page owns the three.js/VRM scene and the WebSocket. It forwards raw
//! messages to `handle_message`, calls `update(dt)` once per animation frame and
//! applies the returned frame (bone channel writes, morph values, events).

use js_sys::{Function, Reflect, JSON};
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use vizij_avatar_core::{
    AnimationClip, AvatarError, AvatarResult, AvatarRuntime, BehaviorState, Config,
    KeyValueStore, LipsyncFrame, NaturalPose, PriorityLayer, SessionSnapshot,
};

#[wasm_bindgen]
pub struct VizijAvatar {
    core: AvatarRuntime,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn js_err(e: AvatarError) -> JsError {
    JsError::new(&e.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<JsValue, JsError> {
    // Plain objects rather than Maps so callers can use dot access.
    let ser = swb::Serializer::new().serialize_maps_as_objects(true);
    value
        .serialize(&ser)
        .map_err(|e| JsError::new(&format!("{what} error: {e}")))
}

fn stringify(value: &JsValue, what: &str) -> Result<String, JsError> {
    JSON::stringify(value)
        .map_err(|e| JsError::new(&format!("{what} stringify error: {:?}", e)))?
        .as_string()
        .ok_or_else(|| JsError::new(&format!("{what}: stringify produced non-string")))
}

fn now_or(now_ms: Option<f64>) -> u64 {
    now_ms.unwrap_or_else(js_sys::Date::now).max(0.0) as u64
}

/// `KeyValueStore` over any object exposing `getItem`/`setItem`/`removeItem`
/// (`window.localStorage`, `sessionStorage` or a test double).
struct JsStorage {
    target: JsValue,
}

impl JsStorage {
    fn method(&self, name: &str) -> AvatarResult<Function> {
        Reflect::get(&self.target, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| AvatarError::Store(format!("storage has no {name}()")))
    }
}

fn store_err(op: &str, e: JsValue) -> AvatarError {
    AvatarError::Store(format!("{op} failed: {e:?}"))
}

impl KeyValueStore for JsStorage {
    fn get(&self, key: &str) -> AvatarResult<Option<String>> {
        let val = self
            .method("getItem")?
            .call1(&self.target, &JsValue::from_str(key))
            .map_err(|e| store_err("getItem", e))?;
        Ok(val.as_string())
    }

    fn set(&mut self, key: &str, value: &str) -> AvatarResult<()> {
        self.method("setItem")?
            .call2(&self.target, &JsValue::from_str(key), &JsValue::from_str(value))
            .map(|_| ())
            .map_err(|e| store_err("setItem", e))
    }

    fn remove(&mut self, key: &str) -> AvatarResult<()> {
        self.method("removeItem")?
            .call1(&self.target, &JsValue::from_str(key))
            .map(|_| ())
            .map_err(|e| store_err("removeItem", e))
    }
}

#[wasm_bindgen]
impl VizijAvatar {
    /// Create a runtime with the built-in clips registered. Pass a (partial) JSON
    /// config object or undefined/null for defaults.
    /// Example:
    ///   new VizijAvatar({ blink: { enabled: false } })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<VizijAvatar, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };

        Ok(VizijAvatar {
            core: AvatarRuntime::new(cfg).with_standard_clips(),
        })
    }

    /// Register (or replace) a clip. `layer` is optional ("BASE", "MOVEMENT",
    /// "GESTURE", "EMERGENCY"); without it the clip name decides. Returns the layer.
    #[wasm_bindgen(js_name = register_clip)]
    pub fn register_clip(&mut self, clip: JsValue, layer: JsValue) -> Result<JsValue, JsError> {
        if jsvalue_is_undefined_or_null(&clip) {
            return Err(JsError::new("register_clip: clip is null/undefined"));
        }
        let clip = AnimationClip::from_json(&stringify(&clip, "register_clip")?).map_err(js_err)?;
        let layer: Option<PriorityLayer> = if jsvalue_is_undefined_or_null(&layer) {
            None
        } else {
            Some(swb::from_value(layer).map_err(|e| JsError::new(&format!("layer error: {e}")))?)
        };
        let resolved = self.core.register_clip(clip, layer).map_err(js_err)?;
        to_js(&resolved, "register_clip")
    }

    /// Feed one Command Source message (object or JSON string). Returns false when
    /// the message was rejected; the reason shows up as a `command_rejected` event
    /// in the next frame.
    #[wasm_bindgen(js_name = handle_message)]
    pub fn handle_message(&mut self, msg: JsValue) -> Result<bool, JsError> {
        let json = match msg.as_string() {
            Some(s) => s,
            None => stringify(&msg, "handle_message")?,
        };
        Ok(self.core.handle_command_json(&json).is_ok())
    }

    /// Advance by dt seconds. Returns the frame `{ epoch, pose: { writes }, morphs, events }`.
    #[wasm_bindgen]
    pub fn update(&mut self, dt: f32) -> Result<JsValue, JsError> {
        let frame = self.core.update(dt);
        to_js(frame, "frame")
    }

    #[wasm_bindgen(js_name = play_movement)]
    pub fn play_movement(&mut self, name: String) -> Result<u32, JsError> {
        self.core.play_movement(&name).map(|id| id.0).map_err(js_err)
    }

    #[wasm_bindgen(js_name = stop_movement)]
    pub fn stop_movement(&mut self, name: String) -> Result<bool, JsError> {
        self.core.stop_movement(&name).map_err(js_err)
    }

    #[wasm_bindgen(js_name = stop_all_movements)]
    pub fn stop_all_movements(&mut self) {
        self.core.stop_all_movements();
    }

    /// Apply an emotion preset. Intensity defaults to 1, priority to the configured one.
    #[wasm_bindgen(js_name = apply_emotion)]
    pub fn apply_emotion(
        &mut self,
        name: String,
        intensity: Option<f32>,
        priority: Option<i32>,
    ) -> Result<(), JsError> {
        let priority = priority.unwrap_or(self.core.config().blend_shapes.emotion_priority);
        self.core
            .apply_emotion_with(&name, intensity.unwrap_or(1.0), priority)
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = reset_emotions)]
    pub fn reset_emotions(&mut self) {
        self.core.reset_emotions();
    }

    #[wasm_bindgen(js_name = clear_blend_shapes)]
    pub fn clear_blend_shapes(&mut self) {
        self.core.clear_blend_shapes();
    }

    /// `{ A, I, U, E, O, energy? }`
    #[wasm_bindgen(js_name = set_lipsync)]
    pub fn set_lipsync(&mut self, frame: JsValue) -> Result<(), JsError> {
        let frame: LipsyncFrame = swb::from_value(frame)
            .map_err(|e| JsError::new(&format!("lipsync frame error: {e}")))?;
        self.core.set_lipsync(&frame);
        Ok(())
    }

    #[wasm_bindgen(js_name = get_active_animations)]
    pub fn get_active_animations(&self) -> Result<JsValue, JsError> {
        to_js(&self.core.active_animations(), "active animations")
    }

    #[wasm_bindgen(js_name = get_active_blend_shapes)]
    pub fn get_active_blend_shapes(&self) -> Result<JsValue, JsError> {
        to_js(&self.core.active_blend_shapes(), "active blend shapes")
    }

    #[wasm_bindgen(js_name = get_current_state)]
    pub fn get_current_state(&self) -> String {
        self.core.current_state().as_str().to_string()
    }

    #[wasm_bindgen(js_name = get_allowed_transitions)]
    pub fn get_allowed_transitions(&self) -> Result<JsValue, JsError> {
        to_js(&self.core.allowed_transitions(), "allowed transitions")
    }

    #[wasm_bindgen(js_name = transition_to)]
    pub fn transition_to(&mut self, state: String) -> Result<(), JsError> {
        let state: BehaviorState = state.parse().map_err(js_err)?;
        self.core.transition_to(state).map_err(js_err)
    }

    #[wasm_bindgen(js_name = revert_state)]
    pub fn revert_state(&mut self) -> Result<bool, JsError> {
        self.core.revert_state().map_err(js_err)
    }

    #[wasm_bindgen(js_name = manual_blink)]
    pub fn manual_blink(&mut self) {
        self.core.manual_blink();
    }

    #[wasm_bindgen(js_name = set_blink_enabled)]
    pub fn set_blink_enabled(&mut self, enabled: bool) {
        self.core.blinker_mut().set_enabled(enabled);
    }

    /// Set one rest rotation axis ("x", "y" or "z") of a bone, in radians.
    #[wasm_bindgen(js_name = set_bone_rotation)]
    pub fn set_bone_rotation(&mut self, bone: String, axis: String, value: f32) -> Result<(), JsError> {
        self.core
            .set_bone_rotation(&bone, &axis, value)
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = get_natural_pose)]
    pub fn get_natural_pose(&self) -> Result<JsValue, JsError> {
        to_js(self.core.natural_pose(), "natural pose")
    }

    #[wasm_bindgen(js_name = set_natural_pose)]
    pub fn set_natural_pose(&mut self, pose: JsValue) -> Result<(), JsError> {
        let pose: NaturalPose = serde_json::from_str(&stringify(&pose, "set_natural_pose")?)
            .map_err(|e| JsError::new(&format!("natural pose error: {e}")))?;
        self.core.set_natural_pose(pose);
        Ok(())
    }

    /// Current session snapshot. `now_ms` defaults to `Date.now()`.
    #[wasm_bindgen]
    pub fn snapshot(&self, now_ms: Option<f64>) -> Result<JsValue, JsError> {
        to_js(&self.core.snapshot(now_or(now_ms)), "snapshot")
    }

    /// Schedule replay of a snapshot. Returns false when it is too old.
    #[wasm_bindgen]
    pub fn restore(&mut self, snapshot: JsValue, now_ms: Option<f64>) -> Result<bool, JsError> {
        let snapshot: SessionSnapshot = swb::from_value(snapshot)
            .map_err(|e| JsError::new(&format!("snapshot error: {e}")))?;
        Ok(self.core.restore_snapshot(&snapshot, now_or(now_ms)))
    }

    /// Save the session snapshot into a Storage-like object (e.g. `localStorage`).
    #[wasm_bindgen(js_name = save_session)]
    pub fn save_session(&self, storage: JsValue, now_ms: Option<f64>) -> Result<(), JsError> {
        let mut store = JsStorage { target: storage };
        self.core
            .save_session(&mut store, now_or(now_ms))
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = restore_session)]
    pub fn restore_session(&mut self, storage: JsValue, now_ms: Option<f64>) -> Result<bool, JsError> {
        let mut store = JsStorage { target: storage };
        self.core
            .restore_session(&mut store, now_or(now_ms))
            .map_err(js_err)
    }

    #[wasm_bindgen(js_name = save_natural_pose)]
    pub fn save_natural_pose(&self, storage: JsValue) -> Result<(), JsError> {
        let mut store = JsStorage { target: storage };
        self.core.save_natural_pose(&mut store).map_err(js_err)
    }

    #[wasm_bindgen(js_name = load_natural_pose)]
    pub fn load_natural_pose(&mut self, storage: JsValue) -> Result<bool, JsError> {
        let store = JsStorage { target: storage };
        self.core.load_natural_pose(&store).map_err(js_err)
    }

    #[wasm_bindgen(js_name = reset_natural_pose)]
    pub fn reset_natural_pose(&mut self, storage: JsValue) -> Result<(), JsError> {
        let mut store = JsStorage { target: storage };
        self.core.reset_natural_pose(&mut store).map_err(js_err)
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
