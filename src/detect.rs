/// Content-type detection — classify a text blob before compression.
///
/// Ordered probes; the first match wins, so every input maps to exactly one
/// class. Diff and stacktrace shapes are the most distinctive and run first;
/// generic is the total fallback.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parsers::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Logs,
    Stacktrace,
    Diff,
    Config,
    Generic,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Logs => "logs",
            Self::Stacktrace => "stacktrace",
            Self::Diff => "diff",
            Self::Config => "config",
            Self::Generic => "generic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "code" => Some(Self::Code),
            "logs" => Some(Self::Logs),
            "stacktrace" => Some(Self::Stacktrace),
            "diff" => Some(Self::Diff),
            "config" => Some(Self::Config),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }
}

static STACK_FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+at\s+").unwrap());
static GOROUTINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"goroutine \d+ \[").unwrap());
static LOG_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL)\]").unwrap());
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    // ISO 8601 (2024-01-02T10:20:30, with or without T) or syslog (Jan  2 10:20:30)
    Regex::new(r"^(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}|[A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})")
        .unwrap()
});
static CONFIG_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]+:\s").unwrap());
static CODE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(function |class |def |fn |import |package )").unwrap());

/// Classify a blob without any path hint.
pub fn detect(content: &str) -> ContentType {
    detect_with_path(content, None)
}

/// Classify a blob; a known source-file extension short-circuits to `code`
/// only after the more distinctive diff/stacktrace/log shapes are ruled out.
pub fn detect_with_path(content: &str, path: Option<&str>) -> ContentType {
    let lines: Vec<&str> = content.lines().collect();

    if is_diff(&lines) {
        return ContentType::Diff;
    }
    if is_stacktrace(content, &lines) {
        return ContentType::Stacktrace;
    }
    if is_logs(&lines) {
        return ContentType::Logs;
    }
    if is_config(content, &lines) {
        return ContentType::Config;
    }
    if path.and_then(Language::from_path).is_some() || CODE_KEYWORD.is_match(content) {
        return ContentType::Code;
    }
    ContentType::Generic
}

fn is_diff(lines: &[&str]) -> bool {
    let mut plus = false;
    let mut minus = false;
    for line in lines {
        if line.starts_with("diff --git") || line.starts_with("@@ -") {
            return true;
        }
        if line.starts_with("+++ ") {
            plus = true;
        }
        if line.starts_with("--- ") {
            minus = true;
        }
        if plus && minus {
            return true;
        }
    }
    false
}

fn is_stacktrace(content: &str, lines: &[&str]) -> bool {
    if content.contains("Traceback (most recent call last):") {
        return true;
    }
    if content.contains("panicked at") && content.contains("thread '") {
        return true;
    }
    lines
        .iter()
        .any(|l| STACK_FRAME.is_match(l) || GOROUTINE.is_match(l))
}

fn is_logs(lines: &[&str]) -> bool {
    let non_empty = lines.iter().filter(|l| !l.trim().is_empty()).count();
    if non_empty == 0 {
        return false;
    }
    let matching = lines
        .iter()
        .filter(|l| LOG_LEVEL.is_match(l) || TIMESTAMP.is_match(l))
        .count();
    matching * 5 >= non_empty // >= 20%
}

fn is_config(content: &str, lines: &[&str]) -> bool {
    let trimmed = content.trim();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return true;
    }
    let non_empty: Vec<&&str> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
    if non_empty.is_empty() {
        return false;
    }
    let keyed = non_empty.iter().filter(|l| CONFIG_KEY.is_match(l)).count();
    keyed * 2 >= non_empty.len() // >= 50%
}

/// Keyword-based language sniffing for blobs with no path. Coarse on
/// purpose; callers that have a path should prefer `Language::from_path`.
pub fn detect_language(content: &str) -> Option<Language> {
    let head: String = content.lines().take(50).collect::<Vec<_>>().join("\n");
    if head.contains("<?php") {
        return Some(Language::Php);
    }
    if head.contains("fn ") && (head.contains("let ") || head.contains("impl ") || head.contains("pub ")) {
        return Some(Language::Rust);
    }
    if head.contains("def ") || head.contains("import ") && head.contains("self") {
        return Some(Language::Python);
    }
    if head.contains("package ") && head.contains("func ") {
        return Some(Language::Go);
    }
    if head.contains("func ") && (head.contains("var ") || head.contains("-> ")) {
        return Some(Language::Swift);
    }
    if head.contains("interface ") || head.contains(": string") || head.contains("export type ") {
        return Some(Language::TypeScript);
    }
    if head.contains("function ") || head.contains("const ") || head.contains("=>") {
        return Some(Language::JavaScript);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_wins_first() {
        let blob = "diff --git a/x.rs b/x.rs\n@@ -1,2 +1,2 @@\n-old\n+new\n";
        assert_eq!(detect(blob), ContentType::Diff);
    }

    #[test]
    fn test_plus_minus_pair_is_diff() {
        let blob = "--- a/file\n+++ b/file\n context\n";
        assert_eq!(detect(blob), ContentType::Diff);
    }

    #[test]
    fn test_stacktrace_js() {
        let blob = "TypeError: x is not a function\n    at foo (src/app.js:10:5)\n    at bar (src/app.js:20:3)\n";
        assert_eq!(detect(blob), ContentType::Stacktrace);
    }

    #[test]
    fn test_stacktrace_rust_panic() {
        let blob = "thread 'main' panicked at src/main.rs:4:5:\nboom\n";
        assert_eq!(detect(blob), ContentType::Stacktrace);
    }

    #[test]
    fn test_logs_by_level_density() {
        let blob = "[INFO] started\n[INFO] listening\nplain line\n[ERROR] boom\n";
        assert_eq!(detect(blob), ContentType::Logs);
    }

    #[test]
    fn test_logs_by_timestamp() {
        let blob = "2024-01-02T10:00:00 started\n2024-01-02T10:00:01 ready\n";
        assert_eq!(detect(blob), ContentType::Logs);
    }

    #[test]
    fn test_config_json() {
        assert_eq!(detect(r#"{"name": "app", "port": 8080}"#), ContentType::Config);
    }

    #[test]
    fn test_config_yaml_like() {
        let blob = "name: app\nport: 8080\n\nnested: yes\n";
        assert_eq!(detect(blob), ContentType::Config);
    }

    #[test]
    fn test_code_by_keyword() {
        assert_eq!(detect("fn main() {}\n"), ContentType::Code);
        assert_eq!(detect("def handler(event):\n    pass\n"), ContentType::Code);
    }

    #[test]
    fn test_code_by_path_hint() {
        assert_eq!(
            detect_with_path("x = 1\n", Some("script.py")),
            ContentType::Code
        );
    }

    #[test]
    fn test_generic_fallback_is_total() {
        assert_eq!(detect("just some prose\nwith two lines"), ContentType::Generic);
        assert_eq!(detect(""), ContentType::Generic);
    }

    #[test]
    fn test_detect_language_keywords() {
        assert_eq!(detect_language("pub fn run() { let x = 1; }"), Some(Language::Rust));
        assert_eq!(detect_language("package main\nfunc main() {}"), Some(Language::Go));
        assert_eq!(detect_language("<?php echo 1;"), Some(Language::Php));
        assert_eq!(detect_language("plain text"), None);
    }
}
