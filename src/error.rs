//! Typed error kinds for the stages that propagate failures.
//!
//! Each stage boundary converts its own failures into one of these variants;
//! nothing below the CLI/service boundary panics or bubbles an untyped
//! error. Classification misses and empty synthesis results are *statuses*,
//! not errors, and the apply stage reports its precondition and verification
//! outcomes through [`crate::apply::ApplyOutcome`]. Neither has a variant
//! here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// One scanner sweep failed; the others are unaffected.
    #[error("scan sweep '{sweep}' failed: {reason}")]
    Scan { sweep: &'static str, reason: String },

    /// Best-effort persistence failed. Callers log and continue.
    #[error("persistence failed for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted JSON document could not be parsed.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_display_names_sweep() {
        let err = StageError::Scan { sweep: "client_errors", reason: "boom".into() };
        assert!(err.to_string().contains("client_errors"));
    }

    #[test]
    fn test_json_error_display_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StageError::Json { path: PathBuf::from("data/orders.json"), source };
        assert!(err.to_string().contains("orders.json"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StageError = io.into();
        assert!(matches!(err, StageError::Io(_)));
    }
}
