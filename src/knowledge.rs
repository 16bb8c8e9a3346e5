//! # Pattern knowledge base
//!
//! ## Responsibility
//! The static catalog everything else matches against: error signatures
//! (regex + severity + category), fix templates (pattern + replacement +
//! base confidence + applicable categories), and the category profiles that
//! map a settled category to a root cause and an ordered strategy list.
//!
//! ## Guarantees
//! - Immutable: loaded once per process via `Lazy`, never mutated.
//! - Deterministic: rules live in `Vec`s with enumeration order fixed at
//!   declaration, so the classifier's tie-break never depends on a map's
//!   internal ordering.
//!
//! Matching here is regex over error messages and source text. There is no
//! syntax-tree analysis anywhere in this crate, deliberately.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Severity;

// ---------------------------------------------------------------------------
// PatternRule
// ---------------------------------------------------------------------------

/// One error signature. `group` names the family the rule came from and is
/// reported back in classification output.
#[derive(Debug)]
pub struct PatternRule {
    pub group: &'static str,
    pub regex: Regex,
    pub severity: Severity,
    pub category: &'static str,
}

fn rule(group: &'static str, pattern: &str, severity: Severity, category: &'static str) -> PatternRule {
    // Case-insensitive, matching the original engine's behavior.
    let regex = Regex::new(&format!("(?i){}", pattern)).expect("static pattern rule must compile");
    PatternRule { group, regex, severity, category }
}

/// Every known error signature, in declaration order. The classifier walks
/// this list front to back and lets the last matching rule settle the
/// category.
pub static PATTERN_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    use crate::types::Severity::*;
    vec![
        // JavaScript reference / null errors
        rule("undefined_variable", r"(\w+) is not defined", High, "reference"),
        rule("undefined_variable", r#"Cannot read propert(?:y|ies) ['"]?(\w+)['"]? of undefined"#, High, "null_reference"),
        rule("undefined_variable", r#"Cannot read propert(?:y|ies) ['"]?(\w+)['"]? of null"#, High, "null_reference"),
        rule("undefined_variable", r"(\w+) is undefined", High, "reference"),
        // JavaScript syntax errors
        rule("syntax_error", r#"Unexpected token ['"]?(\S+)['"]?"#, Critical, "syntax"),
        rule("syntax_error", r"Unexpected end of (?:input|JSON)", Critical, "syntax"),
        rule("syntax_error", r"Missing \) after argument list", Critical, "syntax"),
        rule("syntax_error", r"Unexpected identifier", Critical, "syntax"),
        rule("syntax_error", r"Invalid or unexpected token", Critical, "syntax"),
        rule("syntax_error", r"Unterminated string", Critical, "syntax"),
        rule("syntax_error", r"SyntaxError", Critical, "syntax"),
        // JavaScript type errors
        rule("type_error", r"(\w+) is not a function", High, "type"),
        rule("type_error", r#"Cannot set propert(?:y|ies) ['"]?(\w+)['"]? of"#, High, "type"),
        rule("type_error", r"(\w+)\.(\w+) is not a function", High, "type"),
        rule("type_error", r"Assignment to constant variable", High, "type"),
        // Async / module errors
        rule("async_error", r"await is only valid in async function", High, "async"),
        rule("async_error", r"Unhandled promise rejection", Medium, "async"),
        rule("async_error", r"Cannot use import statement outside", High, "module"),
        // Network / API errors
        rule("api_error", r"Failed to fetch", Medium, "network"),
        rule("api_error", r"NetworkError", Medium, "network"),
        rule("api_error", r"CORS.*blocked", Medium, "cors"),
        rule("api_error", r"404.*not found", Low, "resource"),
        rule("api_error", r"500.*internal server error", High, "server"),
        // DOM errors
        rule("dom_error", r#"Cannot read propert(?:y|ies) ['"]?(innerHTML|textContent|style|classList)['"]?"#, Medium, "dom"),
        rule("dom_error", r"querySelector.*null", Medium, "dom"),
        rule("dom_error", r"getElementById.*null", Medium, "dom"),
        rule("dom_error", r#"Failed to execute ['"](\w+)['"]"#, Medium, "dom"),
        // Python import errors
        rule("python_import", r#"ModuleNotFoundError: No module named ['"](\w+)['"]"#, High, "import"),
        rule("python_import", r#"ImportError: cannot import name ['"](\w+)['"]"#, High, "import"),
        // Python attribute / name errors
        rule("python_attribute", r#"AttributeError: ['"](\w+)['"] object has no attribute ['"](\w+)['"]"#, High, "attribute"),
        rule("python_attribute", r#"NameError: name ['"](\w+)['"] is not defined"#, High, "reference"),
        // Python type errors
        rule("python_type", r"TypeError: (\w+) object is not (callable|subscriptable|iterable)", High, "type"),
        rule("python_type", r"TypeError: unsupported operand type", High, "type"),
        // Python index / key errors
        rule("python_index", r"IndexError: list index out of range", Medium, "index"),
        rule("python_index", r#"KeyError: ['"]?(\w+)['"]?"#, Medium, "key"),
        // JSON errors
        rule("json_error", r"Unexpected token.*in JSON at position (\d+)", High, "json"),
        rule("json_error", r"JSON\.parse.*Unexpected", High, "json"),
        rule("json_error", r"SyntaxError.*JSON", High, "json"),
        rule("json_error", r"Invalid JSON", High, "json"),
    ]
});

// ---------------------------------------------------------------------------
// FixTemplate
// ---------------------------------------------------------------------------

/// A reusable substitution rule. `pattern` is stored uncompiled because the
/// `{VAR}` placeholder is substituted per-error before compilation.
/// Replacements use `$n` capture references.
#[derive(Debug, Clone)]
pub struct FixTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
    pub confidence: f64,
    pub applies_to: &'static [&'static str],
}

/// Every fix template. Looked up by name from a category profile's ordered
/// strategy list.
pub static FIX_TEMPLATES: Lazy<Vec<FixTemplate>> = Lazy::new(|| {
    vec![
        // Null / undefined access
        FixTemplate {
            name: "null_check_before_access",
            description: "Add null check before property access",
            pattern: r"(\w+)\.(\w+)",
            replacement: "$1 && $1.$2",
            confidence: 0.85,
            applies_to: &["null_reference"],
        },
        FixTemplate {
            name: "optional_chaining",
            description: "Use optional chaining operator",
            pattern: r"(\w+)\.(\w+)\.(\w+)",
            replacement: "$1?.$2?.$3",
            confidence: 0.90,
            applies_to: &["null_reference"],
        },
        FixTemplate {
            name: "default_value",
            description: "Add default value with nullish coalescing",
            pattern: r"(\w+)\.(\w+)",
            replacement: r#"($1?.$2 ?? "")"#,
            confidence: 0.80,
            applies_to: &["null_reference"],
        },
        // Missing variable definitions
        FixTemplate {
            name: "define_missing_variable",
            description: "Initialize undefined variable",
            pattern: r"^(\s*)(.*)(\b{VAR}\b)",
            replacement: "${1}var {VAR} = null;\n${1}${2}${3}",
            confidence: 0.70,
            applies_to: &["reference"],
        },
        FixTemplate {
            name: "typeof_check",
            description: "Add typeof check before use",
            pattern: r"(\b{VAR}\b)",
            replacement: r#"(typeof {VAR} !== "undefined" ? {VAR} : null)"#,
            confidence: 0.75,
            applies_to: &["reference"],
        },
        // Array / object operations
        FixTemplate {
            name: "array_check",
            description: "Check if array before operations",
            pattern: r"(\w+)\.(map|filter|forEach|reduce|find)",
            replacement: "(Array.isArray($1) ? $1 : []).$2",
            confidence: 0.85,
            applies_to: &["type"],
        },
        FixTemplate {
            name: "empty_array_default",
            description: "Default to empty array",
            pattern: r"(\w+)\s*\|\|\s*\[\]",
            replacement: "($1 || [])",
            confidence: 0.90,
            applies_to: &["type"],
        },
        // Async usage
        FixTemplate {
            name: "add_async",
            description: "Add async keyword to function",
            pattern: r"(function\s+\w+\s*\([^)]*\)\s*\{)",
            replacement: "async $1",
            confidence: 0.80,
            applies_to: &["async"],
        },
        FixTemplate {
            name: "wrap_try_catch",
            description: "Wrap async code in try-catch",
            pattern: r"(await\s+\w+[^;]*;)",
            replacement: "try { $1 } catch(e) { console.error(e); }",
            confidence: 0.75,
            applies_to: &["async"],
        },
        // DOM access
        FixTemplate {
            name: "dom_ready_check",
            description: "Wrap in DOMContentLoaded",
            pattern: r"(document\.(querySelector|getElementById)[^;]+;)",
            replacement: r#"document.addEventListener("DOMContentLoaded", function() { $1 });"#,
            confidence: 0.70,
            applies_to: &["dom"],
        },
        FixTemplate {
            name: "element_exists_check",
            description: "Check element exists before use",
            pattern: r"(\w+)\.(innerHTML|textContent|style)",
            replacement: "$1 && $1.$2",
            confidence: 0.85,
            applies_to: &["dom"],
        },
        // Syntax repairs
        FixTemplate {
            name: "missing_semicolon",
            description: "Add missing semicolon",
            pattern: r"([^;{}\n])\s*\n",
            replacement: "$1;\n",
            confidence: 0.60,
            applies_to: &["syntax"],
        },
        FixTemplate {
            name: "missing_bracket",
            description: "Add missing closing bracket",
            pattern: r"(\{[^}]*$)",
            replacement: "$1\n}",
            confidence: 0.55,
            applies_to: &["syntax"],
        },
        // JSON repairs
        FixTemplate {
            name: "fix_json_trailing_comma",
            description: "Remove trailing comma in JSON",
            pattern: r",(\s*[\]}])",
            replacement: "$1",
            confidence: 0.95,
            applies_to: &["json"],
        },
        FixTemplate {
            name: "fix_json_quotes",
            description: "Fix single quotes to double quotes in JSON",
            pattern: r"'([^']*)':",
            replacement: r#""$1":"#,
            confidence: 0.90,
            applies_to: &["json"],
        },
    ]
});

/// Look a template up by its strategy name.
pub fn template(name: &str) -> Option<&'static FixTemplate> {
    FIX_TEMPLATES.iter().find(|t| t.name == name)
}

// ---------------------------------------------------------------------------
// Category profiles
// ---------------------------------------------------------------------------

/// What a settled category means and how to attack it.
#[derive(Debug, Clone, Copy)]
pub struct CategoryProfile {
    pub root_cause: &'static str,
    /// Strategy names, tried in this order by the synthesizer.
    pub strategies: &'static [&'static str],
    pub confidence: f64,
}

/// Map a category to its profile. Categories without a profile are matched
/// but not fixable by template.
pub fn category_profile(category: &str) -> Option<CategoryProfile> {
    match category {
        "null_reference" => Some(CategoryProfile {
            root_cause: "Attempting to access property of null/undefined value",
            strategies: &["optional_chaining", "null_check_before_access", "default_value"],
            confidence: 0.85,
        }),
        "reference" => Some(CategoryProfile {
            root_cause: "Variable or function used before declaration",
            strategies: &["typeof_check", "define_missing_variable"],
            confidence: 0.70,
        }),
        "type" => Some(CategoryProfile {
            root_cause: "Type mismatch or invalid operation on type",
            strategies: &["array_check", "empty_array_default"],
            confidence: 0.75,
        }),
        "syntax" => Some(CategoryProfile {
            root_cause: "Syntax error in code structure",
            strategies: &["missing_semicolon", "missing_bracket"],
            confidence: 0.60,
        }),
        "async" => Some(CategoryProfile {
            root_cause: "Async/await usage error",
            strategies: &["add_async", "wrap_try_catch"],
            confidence: 0.75,
        }),
        "dom" => Some(CategoryProfile {
            root_cause: "DOM element access before ready or missing",
            strategies: &["element_exists_check", "dom_ready_check"],
            confidence: 0.80,
        }),
        "json" => Some(CategoryProfile {
            root_cause: "Invalid JSON syntax",
            strategies: &["fix_json_trailing_comma", "fix_json_quotes"],
            confidence: 0.90,
        }),
        _ => None,
    }
}
