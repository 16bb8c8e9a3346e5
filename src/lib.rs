pub mod agent;
pub mod api;
pub mod apply;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engines;
pub mod error;
pub mod knowledge;
pub mod learn;
pub mod lint;
pub mod memory;
pub mod persist;
pub mod scan;
pub mod synthesize;
pub mod types;

use sha1::{Digest, Sha1};

/// Current wall-clock time as an ISO-8601 string, the format used by every
/// persisted record.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Deterministic content fingerprint: `<prefix>_<12 hex chars of sha1>`.
///
/// Repeated calls over identical parts yield identical ids, which is what the
/// monitor loop's dedup relies on. Parts are NUL-separated so ("ab", "c")
/// and ("a", "bc") hash differently.
pub fn fingerprint(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", prefix, &digest[..12])
}

/// Truncate a string to at most `max` characters without splitting a char.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
