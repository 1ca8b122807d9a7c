use crate::bib::paths::ArchivePaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

const SCHEMA_VERSION: u32 = 2;

/// Modification time and size of one asset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStamp {
    pub modified_nanos: u64,
    pub len: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchState {
    pub schema_version: u32,
    pub last_cycle_epoch_secs: u64,
    /// Asset file name -> stamp, per category.
    pub seen_assets: BTreeMap<String, BTreeMap<String, AssetStamp>>,
}

impl Default for WatchState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_cycle_epoch_secs: 0,
            seen_assets: BTreeMap::new(),
        }
    }
}

pub fn state_file_path(paths: &ArchivePaths) -> PathBuf {
    paths.state_dir.join("watch_state.json")
}

pub fn load(paths: &ArchivePaths) -> Result<WatchState> {
    let file = state_file_path(paths);
    if !file.exists() {
        return Ok(WatchState::default());
    }

    let raw =
        fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    // Older stamps are not comparable; start over and let every gallery rebuild.
    let version = value.get("schema_version").and_then(|v| v.as_u64()).unwrap_or(0);
    if version < u64::from(SCHEMA_VERSION) {
        return Ok(WatchState::default());
    }
    let parsed: WatchState = serde_json::from_value(value)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    Ok(parsed)
}

pub fn save(paths: &ArchivePaths, state: &WatchState) -> Result<PathBuf> {
    let file = state_file_path(paths);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(state)?;
    fs::write(&file, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", file.display()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_state_loads_default_and_round_trips() {
        let tmp = tempdir().expect("tempdir");
        let paths = ArchivePaths::under(tmp.path());
        let mut state = load(&paths).expect("load");
        assert_eq!(state.schema_version, 2);
        assert!(state.seen_assets.is_empty());

        state
            .seen_assets
            .entry("Robotics".into())
            .or_default()
            .insert(
                "a.png".into(),
                AssetStamp {
                    modified_nanos: 42,
                    len: 7,
                },
            );
        save(&paths, &state).expect("save");
        let reloaded = load(&paths).expect("reload");
        assert_eq!(reloaded.seen_assets["Robotics"]["a.png"].modified_nanos, 42);
        assert_eq!(reloaded.seen_assets["Robotics"]["a.png"].len, 7);
    }

    #[test]
    fn older_schema_starts_fresh() {
        let tmp = tempdir().expect("tempdir");
        let paths = ArchivePaths::under(tmp.path());
        fs::create_dir_all(&paths.state_dir).expect("mkdir");
        fs::write(
            state_file_path(&paths),
            r#"{"schema_version":1,"last_cycle_epoch_secs":9,"seen_assets":{"Robotics":{"a.png":42}}}"#,
        )
        .expect("write");
        let state = load(&paths).expect("load");
        assert_eq!(state.schema_version, 2);
        assert!(state.seen_assets.is_empty());
    }
}
