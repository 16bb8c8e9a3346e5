//! Lightweight static lint heuristics for the file types the agent manages.
//! Regex and substring checks only: fast, local, and deliberately shallow.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

static VAR_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bvar\s+\w+").expect("static regex"));
static LOOSE_EQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^=!]==[^=]").expect("static regex"));
static LOCALHOST_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http://localhost:\d+").expect("static regex"));
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img[^>]*>").expect("static regex"));

/// One finding from a lint pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub severity: Severity,
}

impl LintIssue {
    fn new(kind: &str, message: impl Into<String>, line: Option<usize>, severity: Severity) -> Self {
        Self { kind: kind.to_string(), message: message.into(), line, severity }
    }
}

/// Line-by-line heuristics for JavaScript sources.
pub fn analyze_javascript(path: &Path) -> Vec<LintIssue> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return vec![LintIssue::new("error", format!("Analysis failed: {}", err), None, Severity::High)];
        }
    };
    let path_is_debug = path.to_string_lossy().to_lowercase().contains("debug");

    let mut issues = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let lineno = i + 1;

        if line.contains("console.log") && !path_is_debug {
            issues.push(LintIssue::new("quality", "console.log found", Some(lineno), Severity::Low));
        }

        if VAR_DECL.is_match(line) {
            issues.push(LintIssue::new("style", "Use let/const instead of var", Some(lineno), Severity::Low));
        }

        if LOOSE_EQ.is_match(line) && !line.contains("===") {
            issues.push(LintIssue::new("quality", "Use === instead of ==", Some(lineno), Severity::Medium));
        }

        if LOCALHOST_URL.is_match(line) {
            issues.push(LintIssue::new("config", "Hardcoded localhost URL", Some(lineno), Severity::High));
        }
    }
    issues
}

/// Parse validity check for a JSON file, carrying the parser's line number.
pub fn analyze_json(path: &Path) -> Vec<LintIssue> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return vec![LintIssue::new("error", format!("Analysis failed: {}", err), None, Severity::High)];
        }
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(_) => Vec::new(),
        Err(err) => vec![LintIssue::new(
            "syntax",
            format!("Invalid JSON: {}", err),
            Some(err.line()).filter(|&l| l > 0),
            Severity::Critical,
        )],
    }
}

/// Accessibility and mobile basics for HTML entry points.
pub fn analyze_html(path: &Path) -> Vec<LintIssue> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return vec![LintIssue::new("error", format!("Analysis failed: {}", err), None, Severity::High)];
        }
    };

    let mut issues = Vec::new();
    for tag in IMG_TAG.find_iter(&content) {
        if !tag.as_str().contains("alt=") {
            issues.push(LintIssue::new(
                "accessibility",
                "Image missing alt attribute",
                None,
                Severity::Medium,
            ));
        }
    }
    if !content.contains(r#"<meta name="viewport""#) {
        issues.push(LintIssue::new("mobile", "Missing viewport meta tag", None, Severity::Medium));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_js_console_log_flagged() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "main.js", "console.log('hi');\n");
        let issues = analyze_javascript(&path);
        assert!(issues.iter().any(|i| i.message == "console.log found" && i.line == Some(1)));
    }

    #[test]
    fn test_js_console_log_allowed_in_debug_files() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "debug-panel.js", "console.log('hi');\n");
        let issues = analyze_javascript(&path);
        assert!(issues.iter().all(|i| i.message != "console.log found"));
    }

    #[test]
    fn test_js_loose_equality_flagged() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "main.js", "if (a == b) {}\n");
        let issues = analyze_javascript(&path);
        assert!(issues.iter().any(|i| i.message == "Use === instead of =="));
    }

    #[test]
    fn test_js_strict_equality_not_flagged() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "main.js", "if (a === b) {}\n");
        let issues = analyze_javascript(&path);
        assert!(issues.iter().all(|i| i.message != "Use === instead of =="));
    }

    #[test]
    fn test_js_localhost_url_is_high_severity() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "api.js", "const base = 'http://localhost:3000';\n");
        let issues = analyze_javascript(&path);
        let hit = issues.iter().find(|i| i.message == "Hardcoded localhost URL").unwrap();
        assert_eq!(hit.severity, Severity::High);
    }

    #[test]
    fn test_js_var_declaration_flagged() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "main.js", "var total = 0;\n");
        let issues = analyze_javascript(&path);
        assert!(issues.iter().any(|i| i.kind == "style"));
    }

    #[test]
    fn test_json_valid_is_clean() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "orders.json", "[{\"id\": 1}]");
        assert!(analyze_json(&path).is_empty());
    }

    #[test]
    fn test_json_trailing_comma_reports_line() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "orders.json", "{\n  \"a\": 1,\n}\n");
        let issues = analyze_json(&path);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].line, Some(3));
    }

    #[test]
    fn test_html_missing_alt_and_viewport() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "index.html", "<html><body><img src=\"x.png\"></body></html>");
        let issues = analyze_html(&path);
        assert!(issues.iter().any(|i| i.kind == "accessibility"));
        assert!(issues.iter().any(|i| i.kind == "mobile"));
    }

    #[test]
    fn test_html_with_alt_and_viewport_is_clean() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            "index.html",
            "<html><head><meta name=\"viewport\" content=\"width=device-width\"></head><body><img src=\"x.png\" alt=\"x\"></body></html>",
        );
        assert!(analyze_html(&path).is_empty());
    }
}
