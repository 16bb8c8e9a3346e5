//! Disk helpers for the agent's JSON state files.
//!
//! All writes go through a temp-file-then-rename so a crash mid-write never
//! leaves a truncated state file behind. Corrupt files are moved aside with
//! a timestamp rather than deleted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StageError;

/// Atomically serialize `value` as pretty JSON to `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StageError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| StageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &content).map_err(|source| StageError::Persistence {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StageError::Persistence { path: path.to_path_buf(), source });
    }
    Ok(())
}

/// Read and deserialize a JSON file. `Ok(None)` when the file is absent.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StageError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value = serde_json::from_str(&content).map_err(|source| StageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Move a corrupt or superseded file aside, keeping its bytes.
///
/// The new name appends `.<tag>.<unix-ts>` to the full file name, so
/// `orders.json` becomes `orders.json.corrupted.1700000000`.
pub fn move_aside(path: &Path, tag: &str) -> Result<PathBuf, StageError> {
    let stamped = sibling_with_suffix(path, &format!("{}.{}", tag, unix_ts()));
    fs::rename(path, &stamped)?;
    Ok(stamped)
}

/// A sibling path with `.suffix` appended to the file name.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!("{}.{}", name, suffix))
}

/// Seconds since the Unix epoch.
pub fn unix_ts() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_json_atomic(&path, &vec!["a", "b"]).unwrap();
        let back: Option<Vec<String>> = read_json(&path).unwrap();
        assert_eq!(back.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_write_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_json_atomic(&path, &42u32).unwrap();
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let got: Option<u32> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_read_corrupt_is_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{nope").unwrap();
        let got: Result<Option<u32>, _> = read_json(&path);
        assert!(matches!(got, Err(StageError::Json { .. })));
    }

    #[test]
    fn test_move_aside_keeps_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.json");
        std::fs::write(&path, "{broken").unwrap();
        let stamped = move_aside(&path, "corrupted").unwrap();
        assert!(!path.exists());
        assert!(stamped.file_name().unwrap().to_string_lossy().contains("orders.json.corrupted."));
        assert_eq!(std::fs::read_to_string(stamped).unwrap(), "{broken");
    }

    #[test]
    fn test_sibling_with_suffix_keeps_extension() {
        let p = sibling_with_suffix(Path::new("/tmp/app.js"), "bak.123");
        assert_eq!(p, Path::new("/tmp/app.js.bak.123"));
    }
}
