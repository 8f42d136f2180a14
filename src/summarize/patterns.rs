/// CFTL pattern extraction — Clustering by First Token and Length.
///
/// Entries bucket by (first meaningful token, message length ÷ 50); within a
/// bucket, variable spans collapse to typed placeholders and entries sharing
/// the resulting template merge into one `LogPattern`. Rare templates that
/// carry error keywords are flagged as anomaly candidates.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::compress::logs::LogLevel;

use super::LogEntry;

#[derive(Debug, Clone, Serialize)]
pub struct LogPattern {
    pub template: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Up to three raw example lines.
    pub examples: Vec<String>,
    pub importance: f64,
    pub level: LogLevel,
    pub is_anomaly: bool,
}

const MAX_EXAMPLES: usize = 3;
const LENGTH_BUCKET: usize = 50;

// Placeholder substitutions, applied in this order.
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b").unwrap()
});
static IP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,3}(\.\d{1,3}){3}\b").unwrap());
static HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9a-f]{7,40}\b").unwrap());
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?").unwrap()
});
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:[\w.-]+)?(?:/[\w.-]+){2,}").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[\w.+-]+@[\w.-]+\.\w+\b").unwrap());
static STRING: Lazy<Regex> = Lazy::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).unwrap());
static NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)?\b").unwrap());

static ERROR_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(error|fail(ed|ure)?|fatal|panic|exception|refused|denied)\b").unwrap());

/// Replace variable spans with typed placeholders.
pub fn template_of(message: &str) -> String {
    let s = UUID.replace_all(message, "<UUID>");
    let s = IP.replace_all(&s, "<IP>");
    let s = HASH.replace_all(&s, "<HASH>");
    let s = TIMESTAMP.replace_all(&s, "<TIMESTAMP>");
    let s = PATH.replace_all(&s, "<PATH>");
    let s = URL.replace_all(&s, "<URL>");
    let s = EMAIL.replace_all(&s, "<EMAIL>");
    let s = STRING.replace_all(&s, "<STRING>");
    let s = NUM.replace_all(&s, "<NUM>");
    s.trim().to_string()
}

/// First token that is not a placeholder, punctuation or a level word.
fn first_meaningful_token(template: &str) -> String {
    template
        .split_whitespace()
        .find(|t| {
            let t = t.trim_matches(|c: char| !c.is_alphanumeric());
            t.len() > 1
                && !t.starts_with('<')
                && !matches!(
                    t.to_ascii_uppercase().as_str(),
                    "TRACE" | "DEBUG" | "INFO" | "WARN" | "WARNING" | "ERROR" | "FATAL"
                )
        })
        .unwrap_or("")
        .to_string()
}

fn placeholder_count(template: &str) -> usize {
    template.matches('<').count()
}

/// Bucket, templatize and merge. Output is sorted by importance descending.
pub fn extract_patterns(entries: &[LogEntry]) -> Vec<LogPattern> {
    struct Acc {
        bucket: (String, usize),
        template: String,
        count: usize,
        first_seen: Option<String>,
        last_seen: Option<String>,
        examples: Vec<String>,
        level: LogLevel,
    }

    let mut acc: Vec<Acc> = Vec::new();
    for entry in entries {
        let template = template_of(&entry.message);
        let bucket = (
            first_meaningful_token(&template),
            entry.message.len() / LENGTH_BUCKET,
        );
        if let Some(a) = acc
            .iter_mut()
            .find(|a| a.bucket == bucket && a.template == template)
        {
            a.count += 1;
            a.last_seen = entry.timestamp.clone().or(a.last_seen.take());
            if a.examples.len() < MAX_EXAMPLES {
                a.examples.push(entry.raw.clone());
            }
            // The most severe level observed wins.
            if entry.level < a.level {
                a.level = entry.level;
            }
        } else {
            acc.push(Acc {
                bucket,
                template,
                count: 1,
                first_seen: entry.timestamp.clone(),
                last_seen: entry.timestamp.clone(),
                examples: vec![entry.raw.clone()],
                level: entry.level,
            });
        }
    }

    let total = entries.len().max(1) as f64;
    let max_count = acc.iter().map(|a| a.count).max().unwrap_or(1) as f64;

    let mut patterns: Vec<LogPattern> = acc
        .into_iter()
        .map(|a| {
            let frequency = a.count as f64 / total;
            let rarity = 1.0 - a.count as f64 / max_count;
            let is_anomaly = rarity > 0.7 && ERROR_WORD.is_match(&a.template);
            let penalty = placeholder_count(&a.template) as f64 * 0.02;
            let mut importance = 0.4 * frequency + 0.4 * rarity - penalty;
            if is_anomaly {
                importance += 0.4;
            }
            LogPattern {
                template: a.template,
                count: a.count,
                first_seen: a.first_seen,
                last_seen: a.last_seen,
                examples: a.examples,
                importance: importance.clamp(0.0, 1.0),
                level: a.level,
                is_anomaly,
            }
        })
        .collect();

    patterns.sort_by(|a, b| b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal));
    patterns
}
