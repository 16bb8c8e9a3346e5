//! # Agent memory
//!
//! ## Responsibility
//! The single piece of cross-run mutable state: which error ids the monitor
//! has already processed, and the running fix/scan counters. Loaded once at
//! startup, persisted (atomically) after every mutation, owned by exactly
//! one `Agent` value.
//!
//! ## Guarantees
//! - Bounded: the seen set keeps only the most recent `cap` ids.
//! - Best-effort durable: persistence failures are logged and swallowed;
//!   they never abort the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persist::{read_json, write_json_atomic};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentStats {
    #[serde(default)]
    pub fixes: u64,
    #[serde(default)]
    pub scans: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    #[serde(default)]
    pub seen_errors: Vec<String>,
    #[serde(default)]
    pub stats: AgentStats,
}

impl AgentMemory {
    /// Load memory from disk; a missing or corrupt file yields defaults.
    pub fn load(path: &Path) -> Self {
        match read_json(path) {
            Ok(Some(memory)) => memory,
            Ok(None) => Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "agent memory unreadable, starting fresh");
                Self::default()
            }
        }
    }

    /// Persist to disk. Best-effort: failures are logged, not returned.
    pub fn persist(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(err) = write_json_atomic(path, self) {
            tracing::warn!(path = %path.display(), %err, "failed to persist agent memory");
        }
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_errors.iter().any(|seen| seen == id)
    }

    /// Merge processed ids into the seen set, newest last, keeping at most
    /// `cap` of the most recent.
    pub fn remember<I>(&mut self, ids: I, cap: usize)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            self.seen_errors.retain(|seen| seen != &id);
            self.seen_errors.push(id);
        }
        if self.seen_errors.len() > cap {
            let excess = self.seen_errors.len() - cap;
            self.seen_errors.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_defaults() {
        let dir = tempdir().unwrap();
        let memory = AgentMemory::load(&dir.path().join("agent_memory.json"));
        assert!(memory.seen_errors.is_empty());
        assert_eq!(memory.stats.fixes, 0);
    }

    #[test]
    fn test_load_corrupt_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent_memory.json");
        std::fs::write(&path, "{oops").unwrap();
        let memory = AgentMemory::load(&path);
        assert!(memory.seen_errors.is_empty());
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent_memory.json");
        let mut memory = AgentMemory::default();
        memory.stats.scans = 3;
        memory.remember(["a".to_string(), "b".to_string()], 500);
        memory.persist(&path);

        let back = AgentMemory::load(&path);
        assert_eq!(back.stats.scans, 3);
        assert!(back.has_seen("a"));
        assert!(back.has_seen("b"));
    }

    #[test]
    fn test_persist_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent_data").join("agent_memory.json");
        AgentMemory::default().persist(&path);
        assert!(path.exists());
    }

    #[test]
    fn test_remember_caps_to_most_recent() {
        let mut memory = AgentMemory::default();
        memory.remember((0..10).map(|i| format!("id_{}", i)), 4);
        assert_eq!(memory.seen_errors.len(), 4);
        assert!(!memory.has_seen("id_5"));
        assert!(memory.has_seen("id_6"));
        assert!(memory.has_seen("id_9"));
    }

    #[test]
    fn test_remember_deduplicates_and_refreshes() {
        let mut memory = AgentMemory::default();
        memory.remember(["a".to_string(), "b".to_string()], 500);
        memory.remember(["a".to_string()], 500);
        assert_eq!(memory.seen_errors, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_memory_json_shape() {
        let mut memory = AgentMemory::default();
        memory.remember(["x".to_string()], 500);
        memory.stats.fixes = 2;
        let doc = serde_json::to_value(&memory).unwrap();
        assert_eq!(doc["seen_errors"], serde_json::json!(["x"]));
        assert_eq!(doc["stats"]["fixes"], 2);
        assert_eq!(doc["stats"]["scans"], 0);
    }
}
