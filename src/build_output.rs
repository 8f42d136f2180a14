/// Build-output parsing — turn compiler/linter noise into deduplicated
/// error groups.
///
/// Toolchain detection is a fall-through: the most distinctive formats probe
/// first and the generic parser accepts anything, so parsing never fails.
/// Grouping folds findings that differ only in identifiers, line numbers or
/// quoted names into one record with an occurrence count.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedError {
    pub tool: String,
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub raw: String,
}

/// A deduplicated finding: identical signatures merged, first location kept.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorGroup {
    pub signature: String,
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub count: usize,
    pub file: String,
    pub line: usize,
    pub affected_files: Vec<String>,
    pub samples: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    TypeScript,
    Eslint,
    Bundler,
    Rust,
    Go,
    Generic,
}

impl Toolchain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeScript => "tsc",
            Self::Eslint => "eslint",
            Self::Bundler => "bundler",
            Self::Rust => "rustc",
            Self::Go => "go",
            Self::Generic => "generic",
        }
    }
}

// ── Detection ─────────────────────────────────────────────────────────────────

static TSC_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>[^\s(]+)\((?P<line>\d+),(?P<col>\d+)\): (?P<sev>error|warning) (?P<code>TS\d+): (?P<msg>.+)$").unwrap()
});
static TSC_COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+) - (?P<sev>error|warning) (?P<code>TS\d+): (?P<msg>.+)$").unwrap()
});
static ESLINT_LOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<line>\d+):(?P<col>\d+)\s+(?P<sev>error|warning)\s+(?P<msg>.+?)\s+(?P<rule>[@\w/-]+)$").unwrap()
});
static RUST_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<sev>error|warning)(\[(?P<code>E\d+)\])?: (?P<msg>.+)$").unwrap()
});
static RUST_LOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+--> (?P<file>[^:]+):(?P<line>\d+):(?P<col>\d+)").unwrap());
static GO_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<file>[^\s:]+\.go):(?P<line>\d+)(:(?P<col>\d+))?: (?P<msg>.+)$").unwrap()
});
static BUNDLER_ERR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ERROR|WARNING) in (?P<file>[^\s(]+)( (?P<line>\d+):(?P<col>\d+))?").unwrap()
});
static ESBUILD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[✘▲] \[(?P<sev>ERROR|WARNING)\] (?P<msg>.+)$").unwrap());
static GENERIC_LOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<file>[\w./-]+\.\w{1,4}):(?P<line>\d+)").unwrap());
static GENERIC_SEV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(error|fatal|fail(ed|ure)?|warning)\b").unwrap());

pub fn detect_toolchain(content: &str) -> Toolchain {
    for line in content.lines().take(400) {
        if TSC_PAREN.is_match(line) || TSC_COLON.is_match(line) {
            return Toolchain::TypeScript;
        }
        if ESLINT_LOC.is_match(line) {
            return Toolchain::Eslint;
        }
        if BUNDLER_ERR.is_match(line) || ESBUILD.is_match(line) {
            return Toolchain::Bundler;
        }
        if RUST_LOC.is_match(line) {
            return Toolchain::Rust;
        }
        if GO_LINE.is_match(line) {
            return Toolchain::Go;
        }
    }
    Toolchain::Generic
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Detect the toolchain and parse. The generic parser is the safety net.
pub fn parse_build_output(content: &str) -> Vec<ParsedError> {
    let toolchain = detect_toolchain(content);
    let parsed = match toolchain {
        Toolchain::TypeScript => parse_tsc(content),
        Toolchain::Eslint => parse_eslint(content),
        Toolchain::Bundler => parse_bundler(content),
        Toolchain::Rust => parse_rust(content),
        Toolchain::Go => parse_go(content),
        Toolchain::Generic => parse_generic(content),
    };
    if parsed.is_empty() && toolchain != Toolchain::Generic {
        parse_generic(content)
    } else {
        parsed
    }
}

fn severity(s: &str) -> Severity {
    if s.eq_ignore_ascii_case("warning") {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn parse_tsc(content: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    for line in content.lines() {
        let caps = TSC_PAREN.captures(line).or_else(|| TSC_COLON.captures(line));
        let Some(caps) = caps else { continue };
        out.push(ParsedError {
            tool: "tsc".into(),
            code: caps["code"].to_string(),
            message: caps["msg"].to_string(),
            severity: severity(&caps["sev"]),
            file: caps["file"].to_string(),
            line: caps["line"].parse().unwrap_or(0),
            column: caps["col"].parse().ok(),
            raw: line.to_string(),
        });
    }
    out
}

fn parse_eslint(content: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    let mut current_file = String::from("unknown");
    for line in content.lines() {
        let trimmed = line.trim_end();
        if let Some(caps) = ESLINT_LOC.captures(trimmed) {
            out.push(ParsedError {
                tool: "eslint".into(),
                code: caps["rule"].to_string(),
                message: caps["msg"].to_string(),
                severity: severity(&caps["sev"]),
                file: current_file.clone(),
                line: caps["line"].parse().unwrap_or(0),
                column: caps["col"].parse().ok(),
                raw: line.to_string(),
            });
        } else if !trimmed.is_empty()
            && !trimmed.starts_with(' ')
            && (trimmed.contains('/') || trimmed.contains('.'))
            && !trimmed.contains("problem")
        {
            // Stylish output puts the file path on its own line.
            current_file = trimmed.to_string();
        }
    }
    out
}

fn parse_bundler(content: &str) -> Vec<ParsedError> {
    let mut out = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = BUNDLER_ERR.captures(line) {
            let message = lines
                .get(i + 1)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| line.trim().to_string());
            out.push(ParsedError {
                tool: "bundler".into(),
                code: if line.starts_with("ERROR") { "ERROR" } else { "WARNING" }.into(),
                message,
                severity: if line.starts_with("WARNING") {
                    Severity::Warning
                } else {
                    Severity::Error
                },
                file: caps["file"].to_string(),
                line: caps.name("line").and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
                column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
                raw: line.to_string(),
            });
        } else if let Some(caps) = ESBUILD.captures(line) {
            let (file, line_no) = lines
                .get(i + 1)
                .and_then(|l| GENERIC_LOC.captures(l))
                .map(|c| (c["file"].to_string(), c["line"].parse().unwrap_or(0)))
                .unwrap_or_else(|| ("unknown".into(), 0));
            out.push(ParsedError {
                tool: "bundler".into(),
                code: caps["sev"].to_string(),
                message: caps["msg"].to_string(),
                severity: severity(&caps["sev"]),
                file,
                line: line_no,
                column: None,
                raw: line.to_string(),
            });
        }
    }
    out
}

fn parse_rust(content: &str) -> Vec<ParsedError> {
    let mut out: Vec<ParsedError> = Vec::new();
    for line in content.lines() {
        if let Some(caps) = RUST_HEAD.captures(line) {
            let msg = &caps["msg"];
            // Summary tail lines ("aborting due to ...") are not findings.
            if msg.starts_with("aborting due to") || msg.contains("generated") {
                continue;
            }
            out.push(ParsedError {
                tool: "rustc".into(),
                code: caps.name("code").map(|m| m.as_str().to_string()).unwrap_or_default(),
                message: msg.to_string(),
                severity: severity(&caps["sev"]),
                file: "unknown".into(),
                line: 0,
                column: None,
                raw: line.to_string(),
            });
        } else if let Some(caps) = RUST_LOC.captures(line) {
            if let Some(last) = out.last_mut() {
                if last.file == "unknown" {
                    last.file = caps["file"].to_string();
                    last.line = caps["line"].parse().unwrap_or(0);
                    last.column = caps["col"].parse().ok();
                }
            }
        }
    }
    out
}

fn parse_go(content: &str) -> Vec<ParsedError> {
    content
        .lines()
        .filter_map(|line| {
            let caps = GO_LINE.captures(line)?;
            Some(ParsedError {
                tool: "go".into(),
                code: String::new(),
                message: caps["msg"].to_string(),
                severity: Severity::Error,
                file: caps["file"].to_string(),
                line: caps["line"].parse().unwrap_or(0),
                column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
                raw: line.to_string(),
            })
        })
        .collect()
}

fn parse_generic(content: &str) -> Vec<ParsedError> {
    content
        .lines()
        .filter_map(|line| {
            let sev = GENERIC_SEV.find(line)?;
            let is_warning = sev.as_str().eq_ignore_ascii_case("warning");
            let (file, line_no) = GENERIC_LOC
                .captures(line)
                .map(|c| (c["file"].to_string(), c["line"].parse().unwrap_or(0)))
                .unwrap_or_else(|| ("unknown".into(), 0));
            Some(ParsedError {
                tool: "generic".into(),
                code: String::new(),
                message: line.trim().to_string(),
                severity: if is_warning { Severity::Warning } else { Severity::Error },
                file,
                line: line_no,
                column: None,
                raw: line.to_string(),
            })
        })
        .collect()
}

// ── Grouping ──────────────────────────────────────────────────────────────────

const MAX_SAMPLES: usize = 3;
const MAX_SHOWN_FILES: usize = 3;
const SIGNATURE_CAP: usize = 100;

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'[^']*'|"[^"]*"|`[^`]*`"#).unwrap());
static NUMBERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonical form used for grouping: quoted strings become 'X', numbers
/// become N, whitespace collapses, capped at 100 chars.
fn normalize(s: &str) -> String {
    let s = QUOTED.replace_all(s, "'X'");
    let s = NUMBERS.replace_all(&s, "N");
    let s = WS_RUN.replace_all(&s, " ");
    let s = s.trim();
    s.chars().take(SIGNATURE_CAP).collect()
}

pub fn signature_of(err: &ParsedError) -> String {
    format!("{}:{}", normalize(&err.code), normalize(&err.message))
}

/// Merge identical signatures; keep the first occurrence's location; union
/// affected files; retain up to three raw samples; sort by count desc.
pub fn group_errors(errors: &[ParsedError]) -> Vec<ErrorGroup> {
    let mut groups: Vec<ErrorGroup> = Vec::new();
    for err in errors {
        let sig = signature_of(err);
        if let Some(group) = groups.iter_mut().find(|g| g.signature == sig) {
            group.count += 1;
            if !group.affected_files.contains(&err.file) {
                group.affected_files.push(err.file.clone());
            }
            if group.samples.len() < MAX_SAMPLES {
                group.samples.push(err.raw.clone());
            }
        } else {
            groups.push(ErrorGroup {
                signature: sig,
                code: err.code.clone(),
                message: err.message.clone(),
                severity: err.severity,
                count: 1,
                file: err.file.clone(),
                line: err.line,
                affected_files: vec![err.file.clone()],
                samples: vec![err.raw.clone()],
                suggestion: None,
            });
        }
    }
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

/// Compact human rendering used by the parse_build_output tool.
pub fn render_groups(groups: &[ErrorGroup]) -> String {
    if groups.is_empty() {
        return "No errors or warnings found.".to_string();
    }
    let mut out = String::new();
    for group in groups {
        let sev = match group.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let code = if group.code.is_empty() {
            String::new()
        } else {
            format!(" {}", group.code)
        };
        out.push_str(&format!(
            "{sev}{code} ×{}: {}\n  first at {}:{}\n",
            group.count, group.message, group.file, group.line
        ));
        let shown: Vec<&str> = group
            .affected_files
            .iter()
            .take(MAX_SHOWN_FILES)
            .map(String::as_str)
            .collect();
        let more = group.affected_files.len().saturating_sub(MAX_SHOWN_FILES);
        if more > 0 {
            out.push_str(&format!("  files: {} +{} more\n", shown.join(", "), more));
        } else if shown.len() > 1 {
            out.push_str(&format!("  files: {}\n", shown.join(", ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tsc_grouping_merges_type_variants() {
        let log = "\
src/a.ts(10,5): error TS2345: Argument of type 'string' is not assignable to parameter of type 'number'.
src/b.ts(99,1): error TS2345: Argument of type 'Foo' is not assignable to parameter of type 'Bar'.
";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 2);
        let groups = group_errors(&errors);
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.count, 2);
        assert_eq!(g.affected_files.len(), 2);
        assert_eq!(g.file, "src/a.ts");
        assert_eq!(g.line, 10);
    }

    #[test]
    fn test_rust_location_attaches_to_head() {
        let log = "\
error[E0308]: mismatched types
  --> src/main.rs:42:9
   |
42 |     let x: u32 = \"five\";
";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "E0308");
        assert_eq!(errors[0].file, "src/main.rs");
        assert_eq!(errors[0].line, 42);
    }

    #[test]
    fn test_go_lines() {
        let log = "./main.go:10:2: undefined: frobnicate\n./util.go:3:1: imported and not used: \"fmt\"\n";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].file, "./main.go");
        assert_eq!(errors[0].line, 10);
    }

    #[test]
    fn test_eslint_carries_file_context() {
        let log = "\
src/app.js
  10:5  error  'x' is defined but never used  no-unused-vars
  22:1  warning  Unexpected console statement  no-console
";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].file, "src/app.js");
        assert_eq!(errors[0].code, "no-unused-vars");
        assert_eq!(errors[1].severity, Severity::Warning);
    }

    #[test]
    fn test_generic_never_fails_and_handles_malformed_locations() {
        let log = "something went wrong: ERROR while processing\nall good here\n";
        let errors = parse_build_output(log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "unknown");
        assert_eq!(errors[0].line, 0);
    }

    #[test]
    fn test_sample_cap_and_sort() {
        let mut log = String::new();
        for i in 0..5 {
            log.push_str(&format!("src/f{i}.ts({i},1): error TS1005: ';' expected.\n"));
        }
        log.push_str("src/g.ts(1,1): error TS2304: Cannot find name 'foo'.\n");
        let groups = group_errors(&parse_build_output(&log));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].count, 5);
        assert_eq!(groups[0].samples.len(), 3);
        assert!(groups[0].count >= groups[1].count);
    }

    #[test]
    fn test_normalize_caps_signature() {
        let long = "x".repeat(300);
        assert!(normalize(&long).chars().count() <= 100);
        assert_eq!(normalize("expected 3, got 42"), "expected N, got N");
        assert_eq!(normalize("cannot find 'foo'"), "cannot find 'X'");
    }
}
