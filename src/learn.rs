//! Learning store: the persisted record of applied fixes, and the
//! verified-only corpus the classifier matches new errors against.
//!
//! Persistence here is strictly best-effort. A failed read or write is
//! logged and swallowed; the repair pipeline never stops because history
//! could not be saved.

use std::path::PathBuf;

use crate::persist::{read_json, write_json_atomic};
use crate::types::{Fix, LearnedFix};

pub struct LearningStore {
    path: PathBuf,
    cap: usize,
    floor: f64,
    corpus: Vec<LearnedFix>,
}

impl LearningStore {
    /// Load the store, seeding the similarity corpus from history entries
    /// that were verified and confident enough to be worth reusing.
    pub fn load(path: PathBuf, cap: usize, floor: f64) -> Self {
        let corpus = match read_json::<Vec<Fix>>(&path) {
            Ok(Some(history)) => history
                .iter()
                .filter(|f| f.verified && f.confidence > floor)
                .map(LearnedFix::from)
                .collect(),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not load fix history, starting empty");
                Vec::new()
            }
        };
        Self { path, cap, floor, corpus }
    }

    pub fn corpus(&self) -> &[LearnedFix] {
        &self.corpus
    }

    /// Record an applied fix. Verified fixes above the confidence floor also
    /// join the in-memory corpus immediately so later errors in the same run
    /// can reuse them.
    pub fn record(&mut self, fix: &Fix) {
        if !fix.applied || fix.confidence <= self.floor {
            return;
        }

        if fix.verified {
            self.corpus.push(LearnedFix::from(fix));
        }

        let mut history: Vec<Fix> = match read_json(&self.path) {
            Ok(Some(history)) => history,
            Ok(None) => Vec::new(),
            Err(err) => {
                // Leave a corrupt history file in place for inspection
                // rather than overwrite it.
                tracing::warn!(path = %self.path.display(), %err, "fix history unreadable, not persisting");
                return;
            }
        };

        history.push(fix.clone());
        if history.len() > self.cap {
            let excess = history.len() - self.cap;
            history.drain(..excess);
        }

        if let Err(err) = write_json_atomic(&self.path, &history) {
            tracing::warn!(path = %self.path.display(), %err, "failed to persist fix history");
        }
    }
}
