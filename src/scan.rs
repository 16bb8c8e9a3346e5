//! The scanner: five independent sweeps that discover candidate errors.
//!
//! Sweeps are order-independent and isolated: an I/O failure inside one
//! sweep is logged and yields partial (or empty) results for that sweep
//! only. Every emitted error id is a deterministic content fingerprint so
//! repeated scans of unchanged content produce identical id sets.

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use walkdir::WalkDir;

use crate::apply::{check_syntax, CheckOutcome};
use crate::config::AgentConfig;
use crate::error::StageError;
use crate::types::{DetectedError, Severity};
use crate::{fingerprint, lint, now_iso, truncate_chars};

static DIAGNOSTIC_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\d+)").expect("static regex"));
static SCRIPT_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src=["']([^"']+\.js)["']"#).expect("static regex"));
static SOURCE_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/]+").expect("static regex"));

pub struct Scanner<'a> {
    config: &'a AgentConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a AgentConfig) -> Self {
        Self { config }
    }

    /// Run every sweep and concatenate the findings.
    pub async fn scan_all(&self) -> Vec<DetectedError> {
        let mut errors = Vec::new();
        errors.extend(self.client_error_replay());
        errors.extend(self.syntax_sweep().await);
        errors.extend(self.data_integrity_sweep());
        errors.extend(self.resource_sweep());
        errors.extend(self.static_lint_sweep());
        errors
    }

    // -----------------------------------------------------------------------
    // Sweep 1: client error replay
    // -----------------------------------------------------------------------

    /// Map the tail of the external client-error log 1:1 into error records.
    pub fn client_error_replay(&self) -> Vec<DetectedError> {
        match self.try_client_error_replay() {
            Ok(errors) => errors,
            Err(err) => {
                let err = StageError::Scan { sweep: "client_errors", reason: err.to_string() };
                tracing::warn!(%err, "sweep failed, returning no results");
                Vec::new()
            }
        }
    }

    fn try_client_error_replay(&self) -> Result<Vec<DetectedError>, StageError> {
        let log_path = self.config.client_error_log();
        if !log_path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&log_path)?;
        let entries: Vec<Value> = serde_json::from_str(&content).map_err(|source| {
            StageError::Json { path: log_path.clone(), source }
        })?;

        let tail_start = entries.len().saturating_sub(self.config.client_log_tail);
        let mut errors = Vec::new();
        for entry in &entries[tail_start..] {
            let kind = entry.get("type").and_then(Value::as_str).unwrap_or("unknown");
            let message = entry.get("message").and_then(Value::as_str).unwrap_or("");
            let source = entry.get("source").and_then(Value::as_str);
            let line = entry.get("line").and_then(Value::as_u64).map(|l| l as usize);

            let id = match entry.get("id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => fingerprint(
                    "client",
                    &[
                        kind,
                        message,
                        source.unwrap_or(""),
                        &line.map(|l| l.to_string()).unwrap_or_default(),
                    ],
                ),
            };

            let mut error = DetectedError::new(id, kind, truncate_chars(message, 500));
            if let Some(ts) = entry.get("timestamp").and_then(Value::as_str) {
                error.timestamp = ts.to_string();
            } else {
                error.timestamp = now_iso();
            }
            error.file_path = source.map(|s| self.resolve_source_path(s));
            error.line = line;
            error.stack = entry.get("stack").and_then(Value::as_str).map(String::from);
            if let Some(object) = entry.as_object() {
                error.context = object.clone();
            }
            errors.push(error);
        }
        Ok(errors)
    }

    /// Map a client-reported source URL onto a local file, trying the
    /// frontend tree first, then the backend. Unresolvable sources are kept
    /// verbatim so the record still carries them.
    fn resolve_source_path(&self, source: &str) -> String {
        let relative = SOURCE_HOST.replace(source, "");
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return source.to_string();
        }

        let frontend = self.config.frontend_dir().join(relative);
        if frontend.exists() {
            return frontend.display().to_string();
        }
        let backend = self.config.backend_dir().join(relative);
        if backend.exists() {
            return backend.display().to_string();
        }
        source.to_string()
    }

    // -----------------------------------------------------------------------
    // Sweep 2: syntax check over the managed tree
    // -----------------------------------------------------------------------

    /// Run the external syntax checker over every checkable file under the
    /// frontend tree, honoring the ignore list.
    pub async fn syntax_sweep(&self) -> Vec<DetectedError> {
        let root = self.config.frontend_dir();
        if !root.exists() {
            return Vec::new();
        }

        let timeout = Duration::from_secs(self.config.checker_timeout_secs);
        let mut errors = Vec::new();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file()
                || !self.config.is_checkable(path)
                || self.config.is_ignored(path)
            {
                continue;
            }

            match check_syntax(path, timeout).await {
                CheckOutcome::Passed => {}
                CheckOutcome::Failed { detail } => {
                    let first_line = detail.lines().next().unwrap_or("").to_string();
                    let line = DIAGNOSTIC_LINE
                        .captures(&detail)
                        .and_then(|c| c.get(1))
                        .and_then(|m| m.as_str().parse::<usize>().ok());
                    let mut error = DetectedError::new(
                        fingerprint("syntax", &[&path.display().to_string(), &first_line]),
                        "syntax",
                        truncate_chars(&detail, 300),
                    )
                    .with_file(path.display().to_string())
                    .with_severity(Severity::Critical);
                    error.line = line;
                    errors.push(error);
                }
                CheckOutcome::TimedOut => {
                    tracing::warn!(file = %path.display(), "syntax check timed out, skipping file");
                }
                CheckOutcome::Unavailable { reason } => {
                    // No checker on this machine; the whole sweep is moot.
                    tracing::warn!(%reason, "syntax checker unavailable, skipping sweep");
                    break;
                }
            }
        }
        errors
    }

    // -----------------------------------------------------------------------
    // Sweep 3: data file integrity
    // -----------------------------------------------------------------------

    /// Parse every JSON data file and report the ones that no longer parse.
    pub fn data_integrity_sweep(&self) -> Vec<DetectedError> {
        let data_dir = self.config.data_dir();
        let entries = match std::fs::read_dir(&data_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut errors = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(sweep = "data_integrity", file = %path.display(), %err, "unreadable data file");
                    continue;
                }
            };
            if let Err(err) = serde_json::from_str::<Value>(&content) {
                let message = format!("Invalid JSON in {}: {}", name, err);
                let mut error = DetectedError::new(
                    fingerprint("json", &[&path.display().to_string(), &err.to_string()]),
                    "json",
                    message,
                )
                .with_file(path.display().to_string())
                .with_severity(Severity::Critical);
                error.line = Some(err.line()).filter(|&l| l > 0);
                errors.push(error);
            }
        }
        errors
    }

    // -----------------------------------------------------------------------
    // Sweep 4: missing resources
    // -----------------------------------------------------------------------

    /// Verify that local script references in the HTML entry points resolve
    /// to files that exist.
    pub fn resource_sweep(&self) -> Vec<DetectedError> {
        let frontend = self.config.frontend_dir();
        let entries = match std::fs::read_dir(&frontend) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut errors = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(sweep = "resources", file = %path.display(), %err, "unreadable html file");
                    continue;
                }
            };
            for caps in SCRIPT_SRC.captures_iter(&content) {
                let src = &caps[1];
                if src.starts_with("http") || src.starts_with("//") {
                    continue;
                }
                if !frontend.join(src).exists() {
                    errors.push(
                        DetectedError::new(
                            fingerprint("missing", &[&path.display().to_string(), src]),
                            "resource",
                            format!("Missing script: {}", src),
                        )
                        .with_file(path.display().to_string())
                        .with_severity(Severity::Medium),
                    );
                }
            }
        }
        errors
    }

    // -----------------------------------------------------------------------
    // Sweep 5: static lint over critical files
    // -----------------------------------------------------------------------

    /// Apply the lint heuristics to the fixed allowlist of critical files,
    /// keeping only high and critical findings.
    pub fn static_lint_sweep(&self) -> Vec<DetectedError> {
        let mut errors = Vec::new();
        for path in self.config.critical_files() {
            if !path.exists() {
                continue;
            }
            for issue in lint::analyze_javascript(&path) {
                if issue.severity < Severity::High {
                    continue;
                }
                let line_text = issue.line.map(|l| l.to_string()).unwrap_or_default();
                let mut error = DetectedError::new(
                    fingerprint("analysis", &[&path.display().to_string(), &line_text, &issue.message]),
                    issue.kind.clone(),
                    issue.message.clone(),
                )
                .with_file(path.display().to_string())
                .with_severity(Severity::Medium);
                error.line = issue.line;
                errors.push(error);
            }
        }
        errors
    }
}
