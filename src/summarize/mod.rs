/// Log summarizer — structured `LogSummary` built from scoring, CFTL pattern
/// extraction and clustering.
pub mod cluster;
pub mod patterns;
pub mod score;

use serde::Serialize;

use crate::compress::logs::{parse_log_line, LogLevel};

pub use cluster::{ClusterHierarchy, ClusterOptions, LogCluster, SimilarityMetric};
pub use patterns::LogPattern;
pub use score::ScoreWeights;

// ── Entry model ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub raw: String,
}

/// Parse raw log text into entries, skipping blank lines.
pub fn parse_entries(content: &str) -> Vec<LogEntry> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|raw| {
            let line = parse_log_line(raw);
            LogEntry {
                timestamp: line.timestamp,
                level: line.level,
                message: line.message,
                raw: line.raw,
            }
        })
        .collect()
}

// ── Summary model ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LogStatistics {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub debug: usize,
    pub other: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timespan: Option<Timespan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Timespan {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub overview: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub key_events: Vec<String>,
    pub statistics: LogStatistics,
    pub patterns: Vec<LogPattern>,
    pub clusters: Vec<LogCluster>,
}

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub weights: ScoreWeights,
    pub clustering: ClusterOptions,
    /// Cap on listed errors/warnings/key events.
    pub max_items: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            clustering: ClusterOptions::default(),
            max_items: 10,
        }
    }
}

/// Build the full structured summary for a log blob.
pub fn summarize(content: &str, options: &SummarizeOptions) -> LogSummary {
    let entries = parse_entries(content);
    let scores = score::score_entries(&entries, &options.weights);
    let patterns = patterns::extract_patterns(&entries);
    let clusters = cluster::cluster(&entries, &scores, &options.clustering);

    let count = |level: LogLevel| entries.iter().filter(|e| e.level == level).count();
    let statistics = LogStatistics {
        total: entries.len(),
        errors: count(LogLevel::Error),
        warnings: count(LogLevel::Warn),
        info: count(LogLevel::Info),
        debug: count(LogLevel::Debug) + count(LogLevel::Trace),
        other: count(LogLevel::Other),
        timespan: timespan_of(&entries),
    };

    // Deduplicated error/warning lines, highest score first.
    let ranked_lines = |level: LogLevel| {
        let mut idxs: Vec<usize> = (0..entries.len())
            .filter(|&i| entries[i].level == level)
            .collect();
        idxs.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));
        let mut seen: Vec<&str> = Vec::new();
        let mut out: Vec<String> = Vec::new();
        for i in idxs {
            let msg = entries[i].message.as_str();
            if !seen.contains(&msg) {
                seen.push(msg);
                out.push(entries[i].raw.clone());
            }
            if out.len() >= options.max_items {
                break;
            }
        }
        out
    };
    let errors = ranked_lines(LogLevel::Error);
    let warnings = ranked_lines(LogLevel::Warn);

    // Key events: the best-scoring non-error, non-warning entries.
    let mut key_idxs: Vec<usize> = (0..entries.len())
        .filter(|&i| !matches!(entries[i].level, LogLevel::Error | LogLevel::Warn))
        .collect();
    key_idxs.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));
    let key_events: Vec<String> = key_idxs
        .into_iter()
        .take(options.max_items)
        .map(|i| entries[i].raw.clone())
        .collect();

    let overview = match &statistics.timespan {
        Some(span) => format!(
            "{} entries ({} errors, {} warnings) from {} to {}; {} distinct patterns",
            statistics.total, statistics.errors, statistics.warnings, span.start, span.end,
            patterns.len()
        ),
        None => format!(
            "{} entries ({} errors, {} warnings); {} distinct patterns",
            statistics.total, statistics.errors, statistics.warnings,
            patterns.len()
        ),
    };

    LogSummary {
        overview,
        errors,
        warnings,
        key_events,
        statistics,
        patterns,
        clusters,
    }
}

fn timespan_of(entries: &[LogEntry]) -> Option<Timespan> {
    let mut stamps = entries.iter().filter_map(|e| e.timestamp.as_deref());
    let first = stamps.next()?;
    let last = stamps.last().unwrap_or(first);
    Some(Timespan { start: first.to_string(), end: last.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_statistics_and_overview() {
        let content = "\
2024-03-01T10:00:00 [INFO] service starting
2024-03-01T10:00:01 [INFO] listening on :8080
2024-03-01T10:05:00 [WARN] slow request 900ms
2024-03-01T10:06:00 [ERROR] db connection refused
2024-03-01T10:07:00 [INFO] retrying
";
        let summary = summarize(content, &SummarizeOptions::default());
        assert_eq!(summary.statistics.total, 5);
        assert_eq!(summary.statistics.errors, 1);
        assert_eq!(summary.statistics.warnings, 1);
        let span = summary.statistics.timespan.as_ref().unwrap();
        assert!(span.start.starts_with("2024-03-01T10:00:00"));
        assert!(span.end.starts_with("2024-03-01T10:07:00"));
        assert!(summary.overview.contains("5 entries"));
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("db connection refused"));
        assert!(!summary.key_events.is_empty());
    }

    #[test]
    fn test_duplicate_errors_deduplicate() {
        let content = "[ERROR] oom\n[ERROR] oom\n[ERROR] oom\n[ERROR] other\n";
        let summary = summarize(content, &SummarizeOptions::default());
        assert_eq!(summary.errors.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize("", &SummarizeOptions::default());
        assert_eq!(summary.statistics.total, 0);
        assert!(summary.statistics.timespan.is_none());
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_serializes_to_json() {
        let summary = summarize("[INFO] a\n[ERROR] b\n", &SummarizeOptions::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("overview").is_some());
        assert!(json.get("statistics").is_some());
    }
}
