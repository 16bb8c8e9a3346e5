//! # Apply engine
//!
//! ## Responsibility
//! The only code in the crate that mutates managed files. Every apply runs
//! the same sequence: re-verify the precondition, copy the file to a
//! timestamped backup, perform exactly one substring replacement, syntax-check
//! the result when a checker exists for the file type, and roll back from the
//! backup when that check fails.
//!
//! ## Guarantees
//! - No mutation before the backup copy has completed.
//! - Verification failure restores the file byte-for-byte from the backup.
//! - Every call yields exactly one audit `Action`, success or not; internal
//!   errors are converted into failed actions, never propagated.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde_json::json;

use crate::config::AgentConfig;
use crate::error::StageError;
use crate::persist::{sibling_with_suffix, unix_ts};
use crate::truncate_chars;
use crate::types::{Action, Fix};

// ---------------------------------------------------------------------------
// CheckOutcome
// ---------------------------------------------------------------------------

/// Result of one external syntax-check invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed { detail: String },
    TimedOut,
    /// The checker binary could not be spawned at all.
    Unavailable { reason: String },
}

/// Run `node --check` on a file with a hard timeout. The child is killed if
/// the timeout elapses, so a hung checker cannot stall the pipeline.
pub async fn check_syntax(path: &Path, timeout: Duration) -> CheckOutcome {
    let spawned = tokio::process::Command::new("node")
        .arg("--check")
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match spawned {
        Ok(child) => child,
        Err(err) => return CheckOutcome::Unavailable { reason: err.to_string() },
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => CheckOutcome::TimedOut,
        Ok(Err(err)) => CheckOutcome::Unavailable { reason: err.to_string() },
        Ok(Ok(output)) => {
            if output.status.success() {
                CheckOutcome::Passed
            } else {
                CheckOutcome::Failed {
                    detail: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyOutcome
// ---------------------------------------------------------------------------

/// What one `apply` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The substitution is on disk. `verified` is false when no checker
    /// covers the file type or the checker was unavailable.
    Applied { verified: bool },
    /// The original text was no longer present; nothing was touched.
    PreconditionFailed { reason: String },
    /// The post-apply check failed and the file was rolled back.
    VerificationFailed { detail: String },
    /// An unexpected error mid-sequence, surfaced as a failed action.
    Failed { reason: String },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

// ---------------------------------------------------------------------------
// ApplyEngine
// ---------------------------------------------------------------------------

pub struct ApplyEngine {
    config: AgentConfig,
}

impl ApplyEngine {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Apply `fix` to disk under the backup/verify/rollback discipline.
    /// Never returns an error: failures become a failed `Action`.
    pub async fn apply(&self, fix: &mut Fix) -> (ApplyOutcome, Action) {
        match self.try_apply(fix).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(file = %fix.file_path, %err, "apply sequence failed");
                let action = Action::new(
                    "fix_failed",
                    fix.file_path.clone(),
                    truncate_chars(&err.to_string(), 100),
                    false,
                );
                (ApplyOutcome::Failed { reason: err.to_string() }, action)
            }
        }
    }

    async fn try_apply(&self, fix: &mut Fix) -> Result<(ApplyOutcome, Action), StageError> {
        let path = Path::new(&fix.file_path);
        if !path.exists() {
            return Ok(self.precondition_failure(fix, "target file does not exist"));
        }

        let content = std::fs::read_to_string(path)?;
        if !content.contains(&fix.original) {
            return Ok(self.precondition_failure(fix, "original text not found in current content"));
        }

        // The backup must exist before the file is touched; it is both the
        // rollback source and the operator's escape hatch.
        let backup = sibling_with_suffix(path, &format!("bak.{}", unix_ts()));
        std::fs::copy(path, &backup)?;

        let new_content = content.replacen(&fix.original, &fix.fixed, 1);
        std::fs::write(path, &new_content)?;
        fix.applied = true;

        if self.config.is_checkable(path) {
            let timeout = Duration::from_secs(self.config.checker_timeout_secs);
            match check_syntax(path, timeout).await {
                CheckOutcome::Passed => fix.verified = true,
                CheckOutcome::Failed { detail } => {
                    std::fs::copy(&backup, path)?;
                    tracing::warn!(file = %fix.file_path, "fix broke syntax, rolled back");
                    let action = Action::new(
                        "fix_rolled_back",
                        fix.file_path.clone(),
                        truncate_chars(&fix.explanation, 100),
                        false,
                    )
                    .with_detail("backup", json!(backup.display().to_string()))
                    .with_detail("checker", json!(truncate_chars(&detail, 300)));
                    return Ok((ApplyOutcome::VerificationFailed { detail }, action));
                }
                CheckOutcome::TimedOut => {
                    std::fs::copy(&backup, path)?;
                    let detail = format!(
                        "syntax check timed out after {}s",
                        self.config.checker_timeout_secs
                    );
                    tracing::warn!(file = %fix.file_path, "syntax check timed out, rolled back");
                    let action = Action::new(
                        "fix_rolled_back",
                        fix.file_path.clone(),
                        truncate_chars(&fix.explanation, 100),
                        false,
                    )
                    .with_detail("backup", json!(backup.display().to_string()))
                    .with_detail("checker", json!(detail.clone()));
                    return Ok((ApplyOutcome::VerificationFailed { detail }, action));
                }
                CheckOutcome::Unavailable { reason } => {
                    // No checker on this machine: the fix stays applied but
                    // is never marked verified.
                    tracing::warn!(%reason, "syntax checker unavailable, skipping verification");
                }
            }
        }

        let action = Action::new(
            "fix_applied",
            fix.file_path.clone(),
            truncate_chars(&fix.explanation, 100),
            true,
        )
        .with_detail("backup", json!(backup.display().to_string()))
        .with_detail("confidence", json!(fix.confidence))
        .with_detail("strategy", json!(fix.strategy.clone()));

        Ok((ApplyOutcome::Applied { verified: fix.verified }, action))
    }

    fn precondition_failure(&self, fix: &Fix, reason: &str) -> (ApplyOutcome, Action) {
        tracing::info!(file = %fix.file_path, reason, "apply precondition failed");
        let action = Action::new("fix_precondition_failed", fix.file_path.clone(), reason, false);
        (ApplyOutcome::PreconditionFailed { reason: reason.to_string() }, action)
    }
}
