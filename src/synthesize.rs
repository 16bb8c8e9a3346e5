//! Fix synthesis: turn a classification plus current file content into a
//! concrete, localized text substitution.
//!
//! Strategies are tried in the classifier's order. Each one is attempted
//! line-scoped first (when the error carries a line number) and then against
//! the whole file; the first strategy that actually changes something wins.
//! When no template produces a change, a learned fix with a verbatim match
//! is replayed as a last resort.

use regex::Regex;

use crate::classify::Classification;
use crate::knowledge::{template, FixTemplate};
use crate::types::{DetectedError, Fix};

/// Context lines kept around a line-scoped substitution so the apply engine
/// can still find the window if line numbers drift later.
const WINDOW_BEFORE: usize = 3;
const WINDOW_AFTER: usize = 2;
/// Characters of context kept on each side of a whole-file match.
const FALLBACK_CONTEXT: usize = 100;
/// Confidence multiplier when the whole-file fallback was used instead of a
/// line-scoped match.
const FALLBACK_PENALTY: f64 = 0.8;
/// Confidence assigned to a replayed learned fix.
const LEARNED_CONFIDENCE: f64 = 0.90;

/// Generate a fix for `error`, or `None` when no strategy produced a change.
/// A `None` here is a terminal skip for the orchestrator, not a failure.
pub fn generate(
    error: &DetectedError,
    file_content: &str,
    classification: &Classification,
) -> Option<Fix> {
    if !classification.can_fix || classification.fix_strategies.is_empty() {
        return None;
    }

    for strategy in &classification.fix_strategies {
        let Some(tpl) = template(strategy) else { continue };
        if let Some(fix) = apply_template(error, file_content, tpl, classification) {
            return Some(fix);
        }
    }

    // No template worked; replay a learned fix if its original text is still
    // present verbatim.
    if let Some(learned) = &classification.learned_fix {
        if !learned.original.is_empty() && file_content.contains(&learned.original) {
            return Some(Fix::new(
                error.id.as_str(),
                error.message.as_str(),
                error.file_path.clone().unwrap_or_default(),
                learned.original.as_str(),
                learned.fixed.as_str(),
                format!("Learned fix: {}", learned.explanation),
                LEARNED_CONFIDENCE,
                "learned",
            ));
        }
    }

    None
}

fn apply_template(
    error: &DetectedError,
    content: &str,
    tpl: &FixTemplate,
    classification: &Classification,
) -> Option<Fix> {
    // First captured group across all matched patterns, used for {VAR}.
    let var_name = classification
        .matched_patterns
        .iter()
        .find_map(|m| m.captures.first().filter(|c| !c.is_empty()).cloned());

    let (pattern, replacement) = if tpl.pattern.contains("{VAR}") {
        // No captured variable means this strategy cannot be instantiated.
        let var = var_name.as_deref()?;
        (
            tpl.pattern.replace("{VAR}", &regex::escape(var)),
            tpl.replacement.replace("{VAR}", var),
        )
    } else {
        (tpl.pattern.to_string(), tpl.replacement.to_string())
    };

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            tracing::debug!(strategy = tpl.name, %err, "instantiated pattern did not compile");
            return None;
        }
    };

    // Line-scoped attempt.
    if let Some(line) = error.line.filter(|&l| l >= 1) {
        let lines: Vec<&str> = content.split('\n').collect();
        if line <= lines.len() && re.is_match(lines[line - 1]) {
            let fixed_line = re.replacen(lines[line - 1], 1, replacement.as_str()).into_owned();
            let start = line.saturating_sub(WINDOW_BEFORE);
            let end = (line + WINDOW_AFTER).min(lines.len());
            let original_section = lines[start..end].join("\n");

            let mut patched: Vec<String> = lines[start..end].iter().map(|s| s.to_string()).collect();
            patched[line - 1 - start] = fixed_line;
            let fixed_section = patched.join("\n");

            if fixed_section != original_section {
                return Some(Fix::new(
                    error.id.as_str(),
                    error.message.as_str(),
                    error.file_path.clone().unwrap_or_default(),
                    original_section,
                    fixed_section,
                    tpl.description,
                    tpl.confidence,
                    tpl.name,
                ));
            }
        }
    }

    // Whole-file fallback around the first match.
    let m = re.find(content)?;
    let start = floor_char_boundary(content, m.start().saturating_sub(FALLBACK_CONTEXT));
    let end = ceil_char_boundary(content, (m.end() + FALLBACK_CONTEXT).min(content.len()));
    let original_section = &content[start..end];
    let fixed_section = re.replacen(original_section, 1, replacement.as_str());

    if fixed_section != original_section {
        return Some(Fix::new(
            error.id.as_str(),
            error.message.as_str(),
            error.file_path.clone().unwrap_or_default(),
            original_section,
            fixed_section.into_owned(),
            tpl.description,
            tpl.confidence * FALLBACK_PENALTY,
            tpl.name,
        ));
    }

    None
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
