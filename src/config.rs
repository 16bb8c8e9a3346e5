//! Agent configuration.
//!
//! One `AgentConfig` value is built at startup and threaded explicitly
//! through every stage; there is no global config state. Defaults cover the
//! standard storefront tree layout; a `codemedic.toml` at the project root
//! can override the behavior knobs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Extensions the external syntax checker understands.
const CHECKABLE_EXTENSIONS: &[&str] = &["js", "mjs", "jsx"];

/// Path fragments that exclude a file from the syntax sweep.
const IGNORE_SEGMENTS: &[&str] = &["node_modules", ".git", "dist", "build", "agent_data"];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Root of the managed project tree.
    pub project_root: PathBuf,
    /// Minimum confidence a fix needs before it may touch disk.
    pub min_confidence: f64,
    /// Confidence floor below which an applied fix is not worth learning.
    pub learning_floor: f64,
    /// Files above this size are never read for synthesis.
    pub max_file_size_kb: u64,
    /// Seconds between monitor ticks.
    pub monitor_interval_secs: u64,
    /// Unseen errors processed per monitor tick.
    pub monitor_batch: usize,
    /// Most-recent error ids retained in memory.
    pub seen_errors_cap: usize,
    /// Most-recent applied fixes retained in the history file.
    pub fix_history_cap: usize,
    /// Client-error log entries replayed per scan.
    pub client_log_tail: usize,
    /// Timeout for one external syntax-check invocation.
    pub checker_timeout_secs: u64,
    /// Client-error log files larger than this are truncated by rebuild.
    pub log_truncate_bytes: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            min_confidence: 0.5,
            learning_floor: 0.5,
            max_file_size_kb: 500,
            monitor_interval_secs: 30,
            monitor_batch: 5,
            seen_errors_cap: 500,
            fix_history_cap: 500,
            client_log_tail: 50,
            checker_timeout_secs: 10,
            log_truncate_bytes: 1024 * 1024,
        }
    }
}

/// Optional on-disk overrides. Every field is optional so a partial file
/// only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    min_confidence: Option<f64>,
    learning_floor: Option<f64>,
    max_file_size_kb: Option<u64>,
    monitor_interval_secs: Option<u64>,
    monitor_batch: Option<usize>,
    seen_errors_cap: Option<usize>,
    fix_history_cap: Option<usize>,
    client_log_tail: Option<usize>,
    checker_timeout_secs: Option<u64>,
    log_truncate_bytes: Option<u64>,
}

impl AgentConfig {
    /// Defaults rooted at `root`, overlaid with `codemedic.toml` when one
    /// exists there. A malformed overlay is logged and ignored.
    pub fn load(root: impl Into<PathBuf>) -> Self {
        let mut config = Self { project_root: root.into(), ..Self::default() };
        let overlay_path = config.project_root.join("codemedic.toml");
        if let Ok(content) = std::fs::read_to_string(&overlay_path) {
            match toml::from_str::<ConfigOverlay>(&content) {
                Ok(overlay) => config.apply_overlay(overlay),
                Err(err) => {
                    tracing::warn!(path = %overlay_path.display(), %err, "ignoring malformed config overlay");
                }
            }
        }
        config
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.min_confidence {
            self.min_confidence = v;
        }
        if let Some(v) = overlay.learning_floor {
            self.learning_floor = v;
        }
        if let Some(v) = overlay.max_file_size_kb {
            self.max_file_size_kb = v;
        }
        if let Some(v) = overlay.monitor_interval_secs {
            self.monitor_interval_secs = v;
        }
        if let Some(v) = overlay.monitor_batch {
            self.monitor_batch = v;
        }
        if let Some(v) = overlay.seen_errors_cap {
            self.seen_errors_cap = v;
        }
        if let Some(v) = overlay.fix_history_cap {
            self.fix_history_cap = v;
        }
        if let Some(v) = overlay.client_log_tail {
            self.client_log_tail = v;
        }
        if let Some(v) = overlay.checker_timeout_secs {
            self.checker_timeout_secs = v;
        }
        if let Some(v) = overlay.log_truncate_bytes {
            self.log_truncate_bytes = v;
        }
    }

    // -----------------------------------------------------------------------
    // Tree layout
    // -----------------------------------------------------------------------

    pub fn backend_dir(&self) -> PathBuf {
        self.project_root.join("backend")
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.project_root.join("frontend")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend_dir().join("data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.backend_dir().join("logs")
    }

    pub fn agent_dir(&self) -> PathBuf {
        self.backend_dir().join("agent_data")
    }

    pub fn memory_file(&self) -> PathBuf {
        self.agent_dir().join("agent_memory.json")
    }

    pub fn fix_history_file(&self) -> PathBuf {
        self.agent_dir().join("fix_history.json")
    }

    pub fn client_error_log(&self) -> PathBuf {
        self.logs_dir().join("client-errors.json")
    }

    /// Files the static-lint sweep always inspects.
    pub fn critical_files(&self) -> Vec<PathBuf> {
        let js = self.frontend_dir().join("assets").join("js");
        vec![js.join("main.js"), js.join("api.js")]
    }

    // -----------------------------------------------------------------------
    // File classification
    // -----------------------------------------------------------------------

    /// Whether the external syntax checker can validate this file.
    pub fn is_checkable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| CHECKABLE_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    /// Whether the syntax sweep should skip this path entirely.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let ignored_segment = path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| IGNORE_SEGMENTS.contains(&s))
                .unwrap_or(false)
        });
        if ignored_segment {
            return true;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        name.ends_with(".min.js") || name.ends_with(".min.css") || name.contains(".bak.")
    }
}
