/// Compressors — per-shape reducers that trade bytes for information density.
///
/// Every compressor takes `(content, options)` and produces a
/// `CompressedResult` whose stats are computed with the token counter, never
/// with character or word counts. `auto` dispatches on the detected (or
/// hinted) content type.
pub mod config;
pub mod conversation;
pub mod diff;
pub mod generic;
pub mod logs;
pub mod stacktrace;
pub mod tfidf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::detect::{self, ContentType};
use crate::error::{CoreError, Result};
use crate::parsers::{self, Language};
use crate::tokens::count_tokens;

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Minimal,
    #[default]
    Normal,
    Detailed,
}

impl DetailLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "normal" => Some(Self::Normal),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }

    /// Pick one of three per-level values, minimal first.
    pub fn pick<T: Copy>(&self, values: [T; 3]) -> T {
        match self {
            Self::Minimal => values[0],
            Self::Normal => values[1],
            Self::Detailed => values[2],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub level: DetailLevel,
    /// Lines matching any of these regexes are never merged or dropped.
    pub preserve: Vec<String>,
}

impl CompressOptions {
    pub fn with_level(level: DetailLevel) -> Self {
        Self { level, ..Default::default() }
    }

    /// Compile the preserve patterns, surfacing the first bad one.
    pub(crate) fn preserve_regexes(&self) -> Result<Vec<Regex>> {
        self.preserve
            .iter()
            .map(|p| Regex::new(p).map_err(|e| CoreError::PatternInvalid(format!("{p}: {e}"))))
            .collect()
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressStats {
    pub original_lines: usize,
    pub compressed_lines: usize,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub reduction_percent: i32,
    pub technique: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressedResult {
    pub compressed: String,
    pub stats: CompressStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omitted_info: Option<String>,
}

impl CompressedResult {
    /// Assemble the result and its accounting in one place so
    /// `compressed_tokens` always equals `count_tokens(compressed)`.
    pub fn build(
        original: &str,
        compressed: String,
        technique: &str,
        omitted_info: Option<String>,
    ) -> Self {
        let original_tokens = count_tokens(original);
        let compressed_tokens = count_tokens(&compressed);
        let reduction_percent = if original_tokens > 0 {
            (100.0 * (1.0 - compressed_tokens as f64 / original_tokens as f64)).round() as i32
        } else {
            0
        };
        Self {
            stats: CompressStats {
                original_lines: original.lines().count(),
                compressed_lines: compressed.lines().count(),
                original_tokens,
                compressed_tokens,
                reduction_percent,
                technique: technique.to_string(),
            },
            compressed,
            omitted_info,
        }
    }
}

// ── Shared normalization ──────────────────────────────────────────────────────

static HEX_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9a-fA-F]{7,}\b").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Digits to N, long hex runs to HASH, whitespace collapsed — the canonical
/// form used for grouping similar lines.
pub(crate) fn normalize_line(line: &str) -> String {
    let s = HEX_RUN.replace_all(line, "HASH");
    let s = DIGITS.replace_all(&s, "N");
    let s = WS_RUN.replace_all(&s, " ");
    s.trim().to_string()
}

// ── Auto dispatch ─────────────────────────────────────────────────────────────

/// Compress a blob according to its detected (or hinted) content type.
/// Code blobs reduce to their signature skeleton when the language is
/// recognizable; everything else falls back to the generic compressor.
pub fn auto(
    content: &str,
    hint: Option<ContentType>,
    path: Option<&str>,
    options: &CompressOptions,
) -> Result<CompressedResult> {
    let kind = hint.unwrap_or_else(|| detect::detect_with_path(content, path));
    match kind {
        ContentType::Logs => logs::compress(content, options),
        ContentType::Stacktrace => stacktrace::compress(content, options),
        ContentType::Diff => diff::compress(content, &diff::DiffOptions::for_level(options.level)),
        ContentType::Config => config::compress(content, options),
        ContentType::Code => {
            let lang = path
                .and_then(Language::from_path)
                .or_else(|| detect::detect_language(content));
            match lang {
                Some(lang) => {
                    let skeleton = parsers::skeleton(content, lang);
                    if skeleton.trim().is_empty() {
                        generic::compress(content, options)
                    } else {
                        Ok(CompressedResult::build(content, skeleton, "code-skeleton", None))
                    }
                }
                None => generic::compress(content, options),
            }
        }
        ContentType::Generic => generic::compress(content, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_always_token_accounted() {
        let src = "line one\nline one\nline one\nline two\n";
        let out = generic::compress(src, &CompressOptions::default()).unwrap();
        assert_eq!(out.stats.compressed_tokens, count_tokens(&out.compressed));
        assert_eq!(out.stats.original_tokens, count_tokens(src));
    }

    #[test]
    fn test_reduction_percent_bounds() {
        let redundant = "[INFO] tick 1\n".repeat(50);
        let out = generic::compress(&redundant, &CompressOptions::default()).unwrap();
        assert!(out.stats.reduction_percent >= 0 && out.stats.reduction_percent <= 100);
    }

    #[test]
    fn test_empty_input_is_zero_percent() {
        let out = generic::compress("", &CompressOptions::default()).unwrap();
        assert_eq!(out.stats.reduction_percent, 0);
        assert_eq!(out.stats.original_tokens, 0);
    }

    #[test]
    fn test_normalize_line_placeholders() {
        assert_eq!(normalize_line("request 42 took 17ms"), "request N took Nms");
        assert_eq!(
            normalize_line("commit deadbeef1234 pushed"),
            "commit HASH pushed"
        );
    }

    #[test]
    fn test_auto_routes_by_detection() {
        let log = "[ERROR] boom\n[INFO] ok\n[INFO] ok\n";
        let out = auto(log, None, None, &CompressOptions::default()).unwrap();
        assert_eq!(out.stats.technique, "logs");

        let diff_blob = "diff --git a/x b/x\n@@ -1 +1 @@\n-a\n+b\n";
        let out = auto(diff_blob, None, None, &CompressOptions::default()).unwrap();
        assert!(out.stats.technique.starts_with("diff"));
    }

    #[test]
    fn test_auto_honors_hint_over_detection() {
        let text = "plain text line\nanother\n";
        let out = auto(text, Some(ContentType::Logs), None, &CompressOptions::default()).unwrap();
        assert_eq!(out.stats.technique, "logs");
    }

    #[test]
    fn test_invalid_preserve_pattern_is_reported() {
        let opts = CompressOptions {
            preserve: vec!["[unclosed".into()],
            ..Default::default()
        };
        let err = generic::compress("a\nb\n", &opts).unwrap_err();
        assert_eq!(err.code(), "PATTERN_INVALID");
    }
}
