//! Error classification: match a raw error message against the knowledge
//! base and decide whether (and how) it can be fixed.

use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::knowledge::{category_profile, PATTERN_RULES};
use crate::types::{DetectedError, LearnedFix, Severity};

/// Similarity a learned fix's message must reach to be considered a match.
const LEARNED_MATCH_THRESHOLD: f64 = 0.7;
/// Confidence bonus granted when a learned fix is available.
const LEARNED_BONUS: f64 = 0.15;
/// Confidence never exceeds this, bonus included.
const CONFIDENCE_CEILING: f64 = 0.95;
/// Confidence reported when nothing in the knowledge base matched.
const UNKNOWN_CONFIDENCE: f64 = 0.25;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// One rule that matched the error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPattern {
    pub group: String,
    pub matched: String,
    pub captures: Vec<String>,
    pub category: String,
    pub severity: Severity,
}

/// The classifier's verdict on one error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub error_id: String,
    pub matched_patterns: Vec<MatchedPattern>,
    pub category: String,
    pub root_cause: String,
    pub can_fix: bool,
    pub fix_strategies: Vec<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned_fix: Option<LearnedFix>,
}

impl Classification {
    pub fn learned_fix_available(&self) -> bool {
        self.learned_fix.is_some()
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

/// Classify one error against the knowledge base and the learned corpus.
///
/// Every rule is tried; each match overwrites `category`, so the last
/// matching rule in declaration order wins. That tie-break mirrors the
/// behavior this engine has always had and is deterministic because the
/// rules live in a declaration-ordered `Vec`.
///
/// A miss is not an error: the result carries `can_fix = false`, category
/// `"unknown"`, and a low confidence, and the orchestrator marks the error
/// skipped.
pub fn analyze(error: &DetectedError, corpus: &[LearnedFix]) -> Classification {
    let mut matched_patterns = Vec::new();
    let mut category = "unknown".to_string();
    let mut can_fix = false;

    for rule in PATTERN_RULES.iter() {
        if let Some(caps) = rule.regex.captures(&error.message) {
            let captures = caps
                .iter()
                .skip(1)
                .map(|c| c.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            matched_patterns.push(MatchedPattern {
                group: rule.group.to_string(),
                matched: caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
                captures,
                category: rule.category.to_string(),
                severity: rule.severity,
            });
            category = rule.category.to_string();
            can_fix = true;
        }
    }

    let (root_cause, fix_strategies, mut confidence) = match category_profile(&category) {
        Some(profile) => (
            profile.root_cause.to_string(),
            profile.strategies.iter().map(|s| s.to_string()).collect(),
            profile.confidence,
        ),
        None => ("Unable to determine".to_string(), Vec::new(), 0.0),
    };

    if !can_fix {
        confidence = UNKNOWN_CONFIDENCE;
    }

    // Best learned fix above the similarity threshold, if any.
    let learned_fix = best_learned_match(&error.message, corpus);
    if learned_fix.is_some() {
        confidence = (confidence + LEARNED_BONUS).min(CONFIDENCE_CEILING);
    }

    Classification {
        error_id: error.id.clone(),
        matched_patterns,
        category,
        root_cause,
        can_fix,
        fix_strategies,
        confidence,
        learned_fix,
    }
}

/// Normalized similarity between two messages, case-folded.
pub fn message_similarity(a: &str, b: &str) -> f64 {
    TextDiff::from_chars(&a.to_lowercase(), &b.to_lowercase()).ratio() as f64
}

fn best_learned_match(message: &str, corpus: &[LearnedFix]) -> Option<LearnedFix> {
    let mut best: Option<(f64, &LearnedFix)> = None;
    for learned in corpus {
        let score = message_similarity(message, &learned.error_message);
        if score > LEARNED_MATCH_THRESHOLD && best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, learned));
        }
    }
    best.map(|(_, learned)| learned.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::now_iso;

    fn error_with(message: &str) -> DetectedError {
        DetectedError::new("err_1", "runtime", message)
    }

    fn learned(message: &str) -> LearnedFix {
        LearnedFix {
            error_message: message.to_string(),
            original: "cart.total".to_string(),
            fixed: "cart?.total".to_string(),
            explanation: "optional chaining".to_string(),
            strategy: "optional_chaining".to_string(),
            learned_at: now_iso(),
        }
    }

    #[test]
    fn test_null_reference_classification() {
        let c = analyze(&error_with("Cannot read property 'bar' of undefined"), &[]);
        assert_eq!(c.category, "null_reference");
        assert!(c.can_fix);
        assert_eq!(c.fix_strategies[0], "optional_chaining");
        assert_eq!(c.confidence, 0.85);
        assert_eq!(c.root_cause, "Attempting to access property of null/undefined value");
    }

    #[test]
    fn test_capture_group_carried() {
        let c = analyze(&error_with("Cannot read property 'bar' of undefined"), &[]);
        let with_capture = c.matched_patterns.iter().find(|m| !m.captures.is_empty()).unwrap();
        assert_eq!(with_capture.captures[0], "bar");
    }

    #[test]
    fn test_no_match_is_terminal_skip_shape() {
        let c = analyze(&error_with("everything is fine, thanks"), &[]);
        assert!(!c.can_fix);
        assert_eq!(c.category, "unknown");
        assert_eq!(c.confidence, 0.25);
        assert!(c.fix_strategies.is_empty());
        assert!(c.matched_patterns.is_empty());
    }

    #[test]
    fn test_last_matching_rule_settles_category() {
        // Matches both the generic SyntaxError rule (category "syntax") and
        // the later JSON rules (category "json"); declaration order puts the
        // JSON rules last, so json wins.
        let c = analyze(&error_with("SyntaxError: JSON.parse: Unexpected character"), &[]);
        assert_eq!(c.category, "json");
        assert!(c.matched_patterns.len() >= 2);
        assert_eq!(c.fix_strategies[0], "fix_json_trailing_comma");
    }

    #[test]
    fn test_json_category_confidence() {
        let c = analyze(&error_with("Unexpected token } in JSON at position 43"), &[]);
        assert_eq!(c.category, "json");
        assert_eq!(c.confidence, 0.90);
    }

    #[test]
    fn test_learned_bonus_applied_and_capped() {
        let corpus = vec![learned("Cannot read property 'bar' of undefined")];
        let c = analyze(&error_with("Cannot read property 'bar' of undefined"), &corpus);
        assert!(c.learned_fix_available());
        // 0.85 + 0.15 would be 1.0; ceiling is 0.95
        assert_eq!(c.confidence, 0.95);
    }

    #[test]
    fn test_dissimilar_learned_fix_ignored() {
        let corpus = vec![learned("completely unrelated failure text")];
        let c = analyze(&error_with("Cannot read property 'bar' of undefined"), &corpus);
        assert!(!c.learned_fix_available());
        assert_eq!(c.confidence, 0.85);
    }

    #[test]
    fn test_best_learned_match_prefers_closest() {
        let near = learned("Cannot read property 'bar' of undefined");
        let mut nearer = learned("Cannot read property 'bar' of undefined");
        nearer.strategy = "exact".to_string();
        let mut far = learned("Cannot read property 'other_thing' of null maybe");
        far.strategy = "far".to_string();
        let corpus = vec![far, near.clone(), nearer.clone()];
        let c = analyze(&error_with("Cannot read property 'bar' of undefined"), &corpus);
        // Both identical-message entries score 1.0; the first best is kept.
        assert_eq!(c.learned_fix.unwrap().error_message, near.error_message);
    }

    #[test]
    fn test_message_similarity_bounds() {
        assert_eq!(message_similarity("abc", "abc"), 1.0);
        assert!(message_similarity("abc", "xyz") < 0.5);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let c = analyze(&error_with("FAILED TO FETCH"), &[]);
        assert_eq!(c.category, "network");
        // Network errors have no template strategies; still a match.
        assert!(c.can_fix);
        assert!(c.fix_strategies.is_empty());
    }

    #[rstest::rstest]
    #[case("Cannot read property 'x' of undefined", "null_reference")]
    #[case("widget is not defined", "reference")]
    #[case("totals.reduce is not a function", "type")]
    #[case("Unexpected token '}'", "syntax")]
    #[case("await is only valid in async function", "async")]
    #[case("getElementById returned null", "dom")]
    #[case("ModuleNotFoundError: No module named 'stripe'", "import")]
    #[case("KeyError: 'email'", "key")]
    fn test_category_table(#[case] message: &str, #[case] category: &str) {
        let c = analyze(&error_with(message), &[]);
        assert_eq!(c.category, category);
    }
}
