//! Core records shared by every pipeline stage: detected errors, generated
//! fixes, audit actions, and the learned-fix corpus entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::now_iso;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How bad a detected error is. Ordering matters: lint findings below `High`
/// never become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

// ---------------------------------------------------------------------------
// FixStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a detected error. `Pending` is the only non-terminal state;
/// the orchestrator moves each error to exactly one of the other three and
/// never re-enters `Pending` within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixStatus::Pending => write!(f, "pending"),
            FixStatus::Success => write!(f, "success"),
            FixStatus::Failed => write!(f, "failed"),
            FixStatus::Skipped => write!(f, "skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectedError
// ---------------------------------------------------------------------------

/// One error discovered by a scanner sweep.
///
/// The `id` is a deterministic content fingerprint: scanning unchanged
/// content twice yields the same id, which the monitor loop's seen-set
/// relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedError {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    pub severity: Severity,
    pub status: FixStatus,
}

impl DetectedError {
    /// A fresh pending error with defaults for everything optional.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: now_iso(),
            kind: kind.into(),
            message: message.into(),
            file_path: None,
            line: None,
            column: None,
            stack: None,
            context: Map::new(),
            severity: Severity::Medium,
            status: FixStatus::Pending,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

// ---------------------------------------------------------------------------
// Fix
// ---------------------------------------------------------------------------

/// A localized text substitution produced by the synthesizer.
///
/// `original` and `fixed` are small windows of file content, not whole
/// files; the apply engine re-verifies that `original` is still present
/// verbatim before touching disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fix {
    pub id: String,
    pub error_id: String,
    /// Message of the error this fix addresses; recorded so the learned-fix
    /// corpus can match future errors by similarity.
    pub error_message: String,
    pub file_path: String,
    pub original: String,
    pub fixed: String,
    pub explanation: String,
    pub confidence: f64,
    pub strategy: String,
    pub timestamp: String,
    pub applied: bool,
    pub verified: bool,
}

impl Fix {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        error_id: impl Into<String>,
        error_message: impl Into<String>,
        file_path: impl Into<String>,
        original: impl Into<String>,
        fixed: impl Into<String>,
        explanation: impl Into<String>,
        confidence: f64,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("fix_{}", Uuid::new_v4().simple()),
            error_id: error_id.into(),
            error_message: error_message.into(),
            file_path: file_path.into(),
            original: original.into(),
            fixed: fixed.into(),
            explanation: explanation.into(),
            confidence,
            strategy: strategy.into(),
            timestamp: now_iso(),
            applied: false,
            verified: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One audit-log entry. Append-only; every apply-engine operation produces
/// exactly one, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub description: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Action {
    pub fn new(
        kind: impl Into<String>,
        target: impl Into<String>,
        description: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: format!("action_{}", Uuid::new_v4().simple()),
            timestamp: now_iso(),
            kind: kind.into(),
            target: target.into(),
            description: description.into(),
            success,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

// ---------------------------------------------------------------------------
// LearnedFix
// ---------------------------------------------------------------------------

/// A previously applied-and-verified fix, retained so future errors with a
/// similar message can replay it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedFix {
    pub error_message: String,
    pub original: String,
    pub fixed: String,
    pub explanation: String,
    pub strategy: String,
    pub learned_at: String,
}

impl From<&Fix> for LearnedFix {
    fn from(fix: &Fix) -> Self {
        Self {
            error_message: fix.error_message.clone(),
            original: fix.original.clone(),
            fixed: fix.fixed.clone(),
            explanation: fix.explanation.clone(),
            strategy: fix.strategy.clone(),
            learned_at: now_iso(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        let back: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }

    #[test]
    fn test_new_error_is_pending_medium() {
        let err = DetectedError::new("e1", "syntax", "Unexpected token");
        assert_eq!(err.status, FixStatus::Pending);
        assert_eq!(err.severity, Severity::Medium);
        assert!(err.file_path.is_none());
    }

    #[test]
    fn test_error_serializes_type_field() {
        let err = DetectedError::new("e1", "json", "bad json");
        let doc = serde_json::to_value(&err).unwrap();
        assert_eq!(doc["type"], "json");
        assert!(doc.get("file_path").is_none());
    }

    #[test]
    fn test_fix_ids_are_unique() {
        let a = Fix::new("e", "m", "f.js", "a", "b", "x", 0.9, "s");
        let b = Fix::new("e", "m", "f.js", "a", "b", "x", 0.9, "s");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("fix_"));
    }

    #[test]
    fn test_fix_starts_unapplied() {
        let fix = Fix::new("e", "m", "f.js", "a", "b", "x", 0.9, "s");
        assert!(!fix.applied);
        assert!(!fix.verified);
    }

    #[test]
    fn test_learned_fix_from_fix() {
        let fix = Fix::new("e", "boom", "f.js", "a.b", "a?.b", "chain", 0.9, "optional_chaining");
        let learned = LearnedFix::from(&fix);
        assert_eq!(learned.error_message, "boom");
        assert_eq!(learned.strategy, "optional_chaining");
    }

    #[test]
    fn test_action_detail_round_trip() {
        let action = Action::new("fix_applied", "f.js", "desc", true)
            .with_detail("backup", serde_json::json!("f.js.bak.1"));
        let doc = serde_json::to_value(&action).unwrap();
        assert_eq!(doc["details"]["backup"], "f.js.bak.1");
        assert_eq!(doc["type"], "fix_applied");
    }
}
