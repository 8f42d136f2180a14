/// Log compressor — level-aware grouping of repeated message shapes.
///
/// Each line is split into (timestamp, level, message); messages are
/// normalized with the generic placeholders plus IPs, durations and quoted
/// strings, then grouped. Errors surface first, warnings second, everything
/// else by frequency.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{normalize_line, CompressOptions, CompressedResult, DetailLevel};
use crate::error::Result;

// ── Line model ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Other,
}

impl LogLevel {
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "ERROR" | "ERR" | "FATAL" | "CRITICAL" => Self::Error,
            "WARN" | "WARNING" => Self::Warn,
            "INFO" => Self::Info,
            "DEBUG" => Self::Debug,
            "TRACE" => Self::Trace,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub raw: String,
}

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ts>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?|[A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s*").unwrap()
});
static LEVEL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[\[(]?(?P<level>TRACE|DEBUG|INFO|WARN|WARNING|ERROR|ERR|FATAL|CRITICAL)[\])]?[:\s-]\s*").unwrap()
});

/// Split one raw line into its parts. Lines with no recognizable level
/// classify as `Other` with the whole line as message.
pub fn parse_log_line(raw: &str) -> LogLine {
    let mut rest = raw;
    let timestamp = TIMESTAMP.captures(rest).map(|caps| {
        let ts = caps["ts"].to_string();
        rest = &rest[caps.get(0).unwrap().end()..];
        ts
    });
    let level = match LEVEL_TOKEN.captures(rest) {
        Some(caps) => {
            let level = LogLevel::from_token(&caps["level"]);
            rest = &rest[caps.get(0).unwrap().end()..];
            level
        }
        None => LogLevel::Other,
    };
    LogLine {
        timestamp,
        level,
        message: rest.trim().to_string(),
        raw: raw.to_string(),
    }
}

// ── Message normalization ─────────────────────────────────────────────────────

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());
static IP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,3}(\.\d{1,3}){3}\b").unwrap());
static DURATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)?(ms|s|us|µs)\b").unwrap());

/// Normalized message shape used as the grouping key.
pub fn normalize_message(message: &str) -> String {
    let s = QUOTED.replace_all(message, "'X'");
    let s = IP.replace_all(&s, "IP");
    let s = DURATION.replace_all(&s, "DUR");
    normalize_line(&s)
}

// ── Compression ───────────────────────────────────────────────────────────────

struct Group {
    level: LogLevel,
    sample: String,
    count: usize,
}

pub fn compress(content: &str, options: &CompressOptions) -> Result<CompressedResult> {
    let preserve = options.preserve_regexes()?;

    let mut groups: Vec<Group> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut pinned: Vec<String> = Vec::new();
    let mut counts = [0usize; 3]; // errors, warnings, info

    for raw in content.lines().filter(|l| !l.trim().is_empty()) {
        if preserve.iter().any(|re| re.is_match(raw)) {
            pinned.push(raw.to_string());
            continue;
        }
        let line = parse_log_line(raw);
        match line.level {
            LogLevel::Error => counts[0] += 1,
            LogLevel::Warn => counts[1] += 1,
            LogLevel::Info => counts[2] += 1,
            _ => {}
        }
        let key = format!("{:?}:{}", line.level, normalize_message(&line.message));
        match keys.iter().position(|k| *k == key) {
            Some(idx) => groups[idx].count += 1,
            None => {
                keys.push(key);
                groups.push(Group {
                    level: line.level,
                    sample: raw.to_string(),
                    count: 1,
                });
            }
        }
    }

    let unique_patterns = groups.len();
    // Errors first, then warnings, then by frequency.
    groups.sort_by(|a, b| {
        let rank = |g: &Group| match g.level {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            _ => 2,
        };
        rank(a).cmp(&rank(b)).then(b.count.cmp(&a.count))
    });

    let mut out: Vec<String> = Vec::new();
    for line in pinned {
        out.push(line);
    }
    for group in &groups {
        if group.count > 1 {
            out.push(format!("{} (×{})", group.sample, group.count));
        } else {
            out.push(group.sample.clone());
        }
    }

    if options.level != DetailLevel::Minimal {
        out.push(String::new());
        out.push(format!(
            "summary: {} errors, {} warnings, {} info, {} unique patterns",
            counts[0], counts[1], counts[2], unique_patterns
        ));
    }

    Ok(CompressedResult::build(content, out.join("\n"), "logs", None))
}
