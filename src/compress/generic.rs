/// Generic line compressor — the fallback for text with no stronger shape.
///
/// Two passes: collapse consecutive duplicate lines, then fold lines sharing
/// a normalized form into one representative plus an omission marker. Marker
/// lines are themselves exempt from both passes, which keeps the compressor
/// idempotent.
use once_cell::sync::Lazy;
use regex::Regex;

use super::{normalize_line, CompressOptions, CompressedResult, DetailLevel};
use crate::error::Result;

static ALERT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(error|Error|ERROR|fail|fatal|warn|Warning)").unwrap());

const MARKER_PREFIX: &str = "… (";

pub fn compress(content: &str, options: &CompressOptions) -> Result<CompressedResult> {
    let preserve = options.preserve_regexes()?;
    let threshold = options.level.pick([2usize, 3, 5]);
    let detailed = options.level == DetailLevel::Detailed;

    let is_pinned = |line: &str| {
        line.starts_with(MARKER_PREFIX) || preserve.iter().any(|re| re.is_match(line))
    };

    // Pass 1: consecutive exact duplicates.
    let mut deduped: Vec<String> = Vec::new();
    let mut run_count = 0usize;
    let mut omitted_duplicates = 0usize;
    let lines: Vec<&str> = content.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 && *line == lines[i - 1] && !is_pinned(line) {
            run_count += 1;
            continue;
        }
        if run_count > 0 {
            deduped.push(format!("… (repeated {run_count} more times)"));
            omitted_duplicates += run_count;
            run_count = 0;
        }
        deduped.push((*line).to_string());
    }
    if run_count > 0 {
        deduped.push(format!("… (repeated {run_count} more times)"));
        omitted_duplicates += run_count;
    }

    // Pass 2: group by normalized form. Alert lines bypass grouping below
    // the detailed level; pinned lines always do.
    let groupable = |line: &str| {
        !is_pinned(line) && (detailed || !ALERT_KEYWORD.is_match(line)) && !line.trim().is_empty()
    };

    let mut group_sizes: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for line in &deduped {
        if groupable(line) {
            *group_sizes.entry(normalize_line(line)).or_insert(0) += 1;
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut emitted: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut omitted_similar = 0usize;
    for line in &deduped {
        if !groupable(line) {
            out.push(line.clone());
            continue;
        }
        let key = normalize_line(line);
        let size = group_sizes.get(&key).copied().unwrap_or(1);
        if size <= threshold {
            out.push(line.clone());
            continue;
        }
        if emitted.insert(key) {
            out.push(line.clone());
            out.push(format!("… ({} similar lines omitted)", size - 1));
            omitted_similar += size - 1;
        }
    }

    let omitted_info = if omitted_duplicates + omitted_similar > 0 {
        Some(format!(
            "{omitted_similar} similar and {omitted_duplicates} duplicate lines omitted"
        ))
    } else {
        None
    };

    Ok(CompressedResult::build(
        content,
        out.join("\n"),
        "generic",
        omitted_info,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let src = "tick\ntick\ntick\ntick\ndone\n";
        let out = compress(src, &CompressOptions::default()).unwrap();
        assert!(out.compressed.contains("tick"));
        assert!(out.compressed.contains("… (repeated 3 more times)"));
        assert!(out.compressed.contains("done"));
    }

    #[test]
    fn test_similar_lines_group_past_threshold() {
        let src = "req 1 took 10ms\nreq 2 took 11ms\nreq 3 took 9ms\nreq 4 took 30ms\nother\n";
        let out = compress(src, &CompressOptions::default()).unwrap();
        assert!(out.compressed.contains("req 1 took 10ms"));
        assert!(out.compressed.contains("… (3 similar lines omitted)"));
        assert!(!out.compressed.contains("req 2"));
    }

    #[test]
    fn test_error_lines_bypass_grouping_at_normal() {
        let src = "Error: disk full 1\nError: disk full 2\nError: disk full 3\nError: disk full 4\n";
        let out = compress(src, &CompressOptions::default()).unwrap();
        for i in 1..=4 {
            assert!(out.compressed.contains(&format!("disk full {i}")));
        }
    }

    #[test]
    fn test_error_lines_group_at_detailed() {
        let src = "Error: disk full 1\nskip\nError: disk full 2\nskip2\nError: disk full 3\nskip3\nError: disk full 4\nskip4\nError: disk full 5\nskip5\nError: disk full 6\n";
        let opts = CompressOptions::with_level(DetailLevel::Detailed);
        let out = compress(src, &opts).unwrap();
        assert!(out.compressed.contains("… (5 similar lines omitted)"));
    }

    #[test]
    fn test_preserve_pattern_pins_lines() {
        let src = "keep 1\nkeep 2\nkeep 3\nkeep 4\n";
        let opts = CompressOptions {
            preserve: vec!["^keep".into()],
            ..Default::default()
        };
        let out = compress(src, &opts).unwrap();
        for i in 1..=4 {
            assert!(out.compressed.contains(&format!("keep {i}")));
        }
    }

    #[test]
    fn test_idempotent() {
        let src = "a 1\na 2\na 3\na 4\nb\nb\nb\nError: kept\n";
        let opts = CompressOptions::default();
        let once = compress(src, &opts).unwrap();
        let twice = compress(&once.compressed, &opts).unwrap();
        assert_eq!(once.compressed, twice.compressed);
    }
}
