//! # Orchestrator
//!
//! ## Responsibility
//! Ties the pipeline together: scanner → classifier → synthesizer → apply
//! engine → learning store, across four run modes (scan, fix, monitor,
//! rebuild). Owns the only mutable cross-run state (agent memory, learned
//! corpus, audit log) and threads one `AgentConfig` value through every
//! stage.
//!
//! ## Per-error lifecycle
//! `pending → skipped` (no usable category, no fix generated, or confidence
//! below threshold), `pending → success` (applied), `pending → failed`
//! (apply precondition missed or verification rolled the file back). All
//! three are terminal within a run.
//!
//! Errors are processed strictly sequentially: each one runs its whole
//! read-backup-write-verify sequence before the next starts, which is what
//! keeps the backup/rollback invariant sound.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::apply::ApplyEngine;
use crate::classify::{self, Classification};
use crate::config::AgentConfig;
use crate::engines::EngineRegistry;
use crate::learn::LearningStore;
use crate::lint::{self, LintIssue};
use crate::memory::{AgentMemory, AgentStats};
use crate::persist::{move_aside, write_json_atomic};
use crate::scan::Scanner;
use crate::synthesize;
use crate::types::{Action, DetectedError, Fix, FixStatus};
use crate::{now_iso, truncate_chars};

// ---------------------------------------------------------------------------
// Run reports
// ---------------------------------------------------------------------------

/// Outcome of one `fix` pass.
#[derive(Debug, Clone, Serialize)]
pub struct FixReport {
    pub scanned: usize,
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub fixes: Vec<Fix>,
}

/// Outcome of one monitor iteration.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TickReport {
    /// Errors discovered by this tick's scan.
    pub discovered: usize,
    /// Discovered errors whose id was not in the seen set.
    pub unseen: usize,
    /// Unseen errors actually processed (bounded by the batch cap).
    pub processed: usize,
    /// Processed errors that ended in a successful fix.
    pub fixed: usize,
}

/// Summary returned when the monitor loop is stopped.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MonitorSummary {
    pub ticks: u64,
    pub stats: AgentStats,
}

/// Outcome of one rebuild pass.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub timestamp: String,
    pub actions: Vec<String>,
    pub total: usize,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// StopHandle
// ---------------------------------------------------------------------------

/// Cloneable handle that asks a running monitor loop to stop. The flag is
/// honored at tick boundaries only; an in-flight fix always runs to
/// completion first.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
        // notify_one stores a permit, so a stop that lands while the loop is
        // mid-tick still wakes the very next sleep immediately.
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct Agent {
    config: AgentConfig,
    learning: LearningStore,
    memory: AgentMemory,
    engines: EngineRegistry,
    apply_engine: ApplyEngine,
    actions: Vec<Action>,
    stop: StopHandle,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let learning = LearningStore::load(
            config.fix_history_file(),
            config.fix_history_cap,
            config.learning_floor,
        );
        let memory = AgentMemory::load(&config.memory_file());
        let apply_engine = ApplyEngine::new(config.clone());
        Self {
            config,
            learning,
            memory,
            engines: EngineRegistry::new(),
            apply_engine,
            actions: Vec::new(),
            stop: StopHandle::default(),
        }
    }

    /// Replace the (default empty) collaborator registry.
    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current agent state for the status endpoint.
    pub fn status(&self) -> Value {
        json!({
            "status": "running",
            "intelligence": "local pattern engine",
            "stats": self.memory.stats,
            "actions": self.actions.len(),
        })
    }

    fn log_action(&mut self, action: Action) {
        let icon = if action.success { "+".green() } else { "x".red() };
        eprintln!("  {} {}: {}", icon, action.kind, action.description);
        self.actions.push(action);
    }

    // -----------------------------------------------------------------------
    // scan mode
    // -----------------------------------------------------------------------

    /// Run every sweep. Reports errors, mutates nothing but the scan counter.
    pub async fn scan(&mut self) -> Vec<DetectedError> {
        self.memory.stats.scans += 1;
        self.memory.persist(&self.config.memory_file());

        eprintln!("{}", "  scanning for errors...".bright_blue());
        let errors = Scanner::new(&self.config).scan_all().await;
        tracing::info!(count = errors.len(), "scan complete");
        eprintln!("  found {} issue(s)", errors.len());
        errors
    }

    // -----------------------------------------------------------------------
    // fix mode
    // -----------------------------------------------------------------------

    /// Run the full pipeline on one error, updating its status in place.
    /// Returns the fix when one was applied.
    pub async fn fix_error(&mut self, error: &mut DetectedError) -> Option<Fix> {
        eprintln!("  analyzing: {}", truncate_chars(&error.message, 80).bright_blue());

        let classification = classify::analyze(error, self.learning.corpus());
        tracing::info!(
            error_id = %error.id,
            category = %classification.category,
            can_fix = classification.can_fix,
            confidence = classification.confidence,
            "classified"
        );

        if !classification.can_fix {
            error.status = FixStatus::Skipped;
            tracing::info!(error_id = %error.id, "no usable category, skipping");
            return None;
        }

        let Some(content) = self.readable_content(error) else {
            error.status = FixStatus::Skipped;
            return None;
        };

        let Some(mut fix) = synthesize::generate(error, &content, &classification) else {
            error.status = FixStatus::Skipped;
            tracing::info!(error_id = %error.id, "no fix generated, skipping");
            return None;
        };

        eprintln!(
            "  fix generated ({} at {:.0}% confidence)",
            fix.strategy,
            fix.confidence * 100.0
        );

        if fix.confidence < self.config.min_confidence {
            error.status = FixStatus::Skipped;
            tracing::info!(
                error_id = %error.id,
                confidence = fix.confidence,
                minimum = self.config.min_confidence,
                "confidence below threshold, skipping"
            );
            return None;
        }

        let (outcome, action) = self.apply_engine.apply(&mut fix).await;
        self.log_action(action);

        if outcome.is_applied() {
            error.status = FixStatus::Success;
            self.learning.record(&fix);
            self.memory.stats.fixes += 1;
            self.memory.persist(&self.config.memory_file());
            Some(fix)
        } else {
            error.status = FixStatus::Failed;
            None
        }
    }

    /// Read the target file for synthesis, respecting the size cap.
    fn readable_content(&self, error: &DetectedError) -> Option<String> {
        let path_str = error.file_path.as_deref()?;
        let path = Path::new(path_str);
        if !path.exists() {
            tracing::info!(error_id = %error.id, "no readable target file, skipping");
            return None;
        }
        if let Ok(meta) = path.metadata() {
            if meta.len() > self.config.max_file_size_kb * 1024 {
                tracing::warn!(file = %path.display(), size = meta.len(), "file exceeds size cap, skipping");
                return None;
            }
        }
        match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(err) => {
                tracing::warn!(file = %path.display(), %err, "could not read target file");
                None
            }
        }
    }

    /// One complete fix pass: scan, then process every error sequentially.
    pub async fn fix_all(&mut self) -> FixReport {
        let mut errors = self.scan().await;
        let mut fixes = Vec::new();
        let (mut failed, mut skipped) = (0usize, 0usize);

        for error in errors.iter_mut() {
            match self.fix_error(error).await {
                Some(fix) => fixes.push(fix),
                None => match error.status {
                    FixStatus::Failed => failed += 1,
                    _ => skipped += 1,
                },
            }
        }

        FixReport { scanned: errors.len(), fixed: fixes.len(), failed, skipped, fixes }
    }

    // -----------------------------------------------------------------------
    // monitor mode
    // -----------------------------------------------------------------------

    /// One monitor iteration: scan, filter out already-seen ids, fix a
    /// bounded batch of the rest, remember what was processed, persist.
    ///
    /// Public so tests can drive ticks synchronously without the loop.
    pub async fn monitor_tick(&mut self) -> TickReport {
        let errors = self.scan().await;
        let discovered = errors.len();

        let mut unseen: Vec<DetectedError> = errors
            .into_iter()
            .filter(|e| !self.memory.has_seen(&e.id))
            .collect();
        let unseen_count = unseen.len();

        let batch = self.config.monitor_batch.min(unseen.len());
        let mut processed_ids = Vec::with_capacity(batch);
        let mut fixed = 0usize;
        for error in unseen.iter_mut().take(batch) {
            if self.fix_error(error).await.is_some() {
                fixed += 1;
            }
            processed_ids.push(error.id.clone());
        }

        self.memory.remember(processed_ids, self.config.seen_errors_cap);
        self.memory.persist(&self.config.memory_file());

        TickReport { discovered, unseen: unseen_count, processed: batch, fixed }
    }

    /// The continuous loop: tick, sleep, repeat until the stop handle fires.
    /// The stop flag is only consulted between ticks, so an in-flight fix
    /// always completes its apply/verify/rollback sequence first. Every
    /// failure inside a tick has already been converted to a terminal error
    /// status or a logged warning, so nothing can unwind out of the loop.
    pub async fn monitor(&mut self) -> MonitorSummary {
        let interval = Duration::from_secs(self.config.monitor_interval_secs);
        eprintln!(
            "{}",
            format!("  monitoring every {}s (stop with ctrl-c)", interval.as_secs()).bright_green()
        );

        let mut ticks = 0u64;
        loop {
            if self.stop.is_stopped() {
                break;
            }

            let report = self.monitor_tick().await;
            ticks += 1;
            if report.processed > 0 {
                eprintln!(
                    "  tick {}: {} new error(s), {} fixed",
                    ticks, report.processed, report.fixed
                );
            }
            tracing::debug!(ticks, discovered = report.discovered, fixed = report.fixed, "monitor tick");

            // Interruptible sleep: a stop request wakes the loop immediately
            // instead of waiting out the interval.
            let notified = self.stop.notify.notified();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = notified => {}
            }
        }

        eprintln!("{}", "  monitor stopped".bright_blue());
        MonitorSummary { ticks, stats: self.memory.stats }
    }

    // -----------------------------------------------------------------------
    // rebuild mode
    // -----------------------------------------------------------------------

    /// Idempotent bootstrap of the managed tree: required directories,
    /// default data files, and log truncation. A second run over an intact
    /// tree reports zero actions.
    pub fn rebuild(&mut self) -> RebuildReport {
        eprintln!("{}", "  rebuilding data tree...".bright_blue());
        let mut actions = Vec::new();
        let mut success = true;

        let uploads = self.config.backend_dir().join("uploads");
        let dirs = [
            self.config.data_dir(),
            self.config.logs_dir(),
            uploads.clone(),
            uploads.join("products"),
            uploads.join("slides"),
            uploads.join("users"),
            self.config.agent_dir(),
        ];
        for dir in dirs {
            if dir.exists() {
                continue;
            }
            match std::fs::create_dir_all(&dir) {
                Ok(()) => actions.push(format!("Created: {}", dir.display())),
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), %err, "could not create directory");
                    success = false;
                }
            }
        }

        for (name, default) in default_data_files() {
            let path = self.config.data_dir().join(name);
            if path.exists() {
                let parses = std::fs::read_to_string(&path)
                    .ok()
                    .map(|c| serde_json::from_str::<Value>(&c).is_ok())
                    .unwrap_or(false);
                if parses {
                    continue;
                }
                // Keep the corrupt bytes around, then restore the default.
                match move_aside(&path, "corrupted") {
                    Ok(_) => {
                        if write_json_atomic(&path, &default).is_ok() {
                            actions.push(format!("Repaired: {}", name));
                        } else {
                            success = false;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(file = %path.display(), %err, "could not move corrupt data file aside");
                        success = false;
                    }
                }
            } else if write_json_atomic(&path, &default).is_ok() {
                actions.push(format!("Created: {}", name));
            } else {
                success = false;
            }
        }

        let log = self.config.client_error_log();
        if let Ok(meta) = log.metadata() {
            if meta.len() > self.config.log_truncate_bytes {
                match std::fs::write(&log, "[]") {
                    Ok(()) => actions.push(format!(
                        "Cleared: {}",
                        log.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
                    )),
                    Err(err) => {
                        tracing::warn!(%err, "could not truncate client error log");
                        success = false;
                    }
                }
            }
        }

        eprintln!("  rebuild complete: {} action(s)", actions.len());
        RebuildReport { timestamp: now_iso(), total: actions.len(), actions, success }
    }

    // -----------------------------------------------------------------------
    // analyze mode
    // -----------------------------------------------------------------------

    /// Single-file lint analysis, dispatched on extension.
    pub fn analyze_file(&self, path: &Path) -> Vec<LintIssue> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") | Some("mjs") | Some("jsx") => lint::analyze_javascript(path),
            Some("json") => lint::analyze_json(path),
            Some("html") => lint::analyze_html(path),
            _ => Vec::new(),
        }
    }

    /// Classify an ad-hoc error message (the service façade's analyze
    /// endpoint).
    pub fn analyze_message(
        &self,
        kind: &str,
        message: &str,
        file_path: Option<String>,
        line: Option<usize>,
    ) -> Classification {
        let mut error = DetectedError::new(format!("api_{}", Uuid::new_v4().simple()), kind, message);
        error.file_path = file_path;
        error.line = line;
        classify::analyze(&error, self.learning.corpus())
    }
}

/// The fixed set of data files rebuild guarantees, with their default
/// shapes.
fn default_data_files() -> Vec<(&'static str, Value)> {
    vec![
        ("users.json", json!([])),
        ("products.json", json!([])),
        ("orders.json", json!([])),
        ("carts.json", json!({})),
        ("sessions.json", json!({})),
        ("slides.json", json!([])),
        ("wishlists.json", json!({})),
        ("contacts.json", json!([])),
        ("adminSettings.json", json!({ "siteName": "Storefront", "maintenance": false })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_status_shape() {
        let dir = tempdir().unwrap();
        let agent = Agent::new(AgentConfig::load(dir.path()));
        let status = agent.status();
        assert_eq!(status["status"], "running");
        assert_eq!(status["stats"]["fixes"], 0);
        assert_eq!(status["actions"], 0);
    }

    #[test]
    fn test_default_data_files_count() {
        assert_eq!(default_data_files().len(), 9);
    }

    #[test]
    fn test_analyze_file_dispatch() {
        let dir = tempdir().unwrap();
        let agent = Agent::new(AgentConfig::load(dir.path()));

        let js = dir.path().join("x.js");
        std::fs::write(&js, "var a = 1;\n").unwrap();
        assert!(!agent.analyze_file(&js).is_empty());

        let other = dir.path().join("x.bin");
        std::fs::write(&other, "data").unwrap();
        assert!(agent.analyze_file(&other).is_empty());
    }

    #[test]
    fn test_analyze_message_classifies() {
        let dir = tempdir().unwrap();
        let agent = Agent::new(AgentConfig::load(dir.path()));
        let c = agent.analyze_message("runtime", "widget is not defined", None, Some(3));
        assert_eq!(c.category, "reference");
        assert!(c.can_fix);
    }

    #[test]
    fn test_stop_handle_flags() {
        let handle = StopHandle::default();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_scan_bumps_counter_and_persists() {
        let dir = tempdir().unwrap();
        let config = AgentConfig::load(dir.path());
        let mut agent = Agent::new(config.clone());
        agent.scan().await;
        agent.scan().await;

        let memory = AgentMemory::load(&config.memory_file());
        assert_eq!(memory.stats.scans, 2);
    }
}
