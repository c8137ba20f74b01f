//! Shared JSON fixtures (clips and scripted command sessions) for avatar tests,
//! benches and demos. Paths are listed in `fixtures/manifest.json` at the
//! workspace root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).map_err(|e| format!("fixtures manifest should parse: {e}"))
});

#[derive(Debug, Deserialize)]
struct Manifest {
    clips: HashMap<String, String>,
    scripts: HashMap<String, ScriptEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        clips: Vec<String>,
    },
}

impl ScriptEntry {
    fn as_path(&self) -> &str {
        match self {
            ScriptEntry::Path(path) => path,
            ScriptEntry::Detailed { path, .. } => path,
        }
    }

    fn clips(&self) -> &[String] {
        match self {
            ScriptEntry::Path(_) => &[],
            ScriptEntry::Detailed { clips, .. } => clips,
        }
    }
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST.as_ref().map_err(|e| anyhow!("{e}"))
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

/// Keyframed skeletal clips in the core's clip JSON format.
pub mod clips {
    use super::*;

    pub fn keys() -> Vec<String> {
        manifest().map(|m| sorted_keys(&m.clips)).unwrap_or_default()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&manifest()?.clips, "clip", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&manifest()?.clips, "clip", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&manifest()?.clips, "clip", name)?;
        Ok(resolve_path(rel))
    }
}

/// Scripted command sessions: messages interleaved with clock advances.
pub mod scripts {
    use super::*;

    pub fn keys() -> Vec<String> {
        manifest()
            .map(|m| sorted_keys(&m.scripts))
            .unwrap_or_default()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&manifest()?.scripts, "script", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&manifest()?.scripts, "script", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&manifest()?.scripts, "script", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    /// Extra clip fixtures a script expects to be registered before it runs.
    pub fn required_clips(name: &str) -> Result<Vec<String>> {
        let entry = lookup(&manifest()?.scripts, "script", name)?;
        Ok(entry.clips().to_vec())
    }
}
