/// Unified-diff compressor.
///
/// Parses git/GNU unified diffs (binary markers and rename detection
/// included) into per-file hunk lists, then renders one of three
/// strategies: hunks-only (changes + trimmed context), summary (counts
/// only) or semantic (TF-IDF-ranked hunks greedily packed into a token
/// budget).
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::tfidf;
use super::{CompressedResult, DetailLevel};
use crate::error::Result;
use crate::tokens::count_tokens;

// ── Model ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// The full `@@ … @@` line, section heading included.
    pub header: String,
    pub lines: Vec<String>,
}

impl Hunk {
    pub fn additions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('+')).count()
    }

    pub fn deletions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('-')).count()
    }

    fn text(&self) -> String {
        format!("{}\n{}", self.header, self.lines.join("\n"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub status: FileStatus,
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    HunksOnly,
    Summary,
    Semantic,
}

#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub strategy: Strategy,
    /// Context lines kept around changes in hunks-only mode.
    pub context_lines: usize,
    /// Semantic budget; defaults to half the original token count.
    pub max_tokens: Option<usize>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::HunksOnly,
            context_lines: 2,
            max_tokens: None,
        }
    }
}

impl DiffOptions {
    pub fn for_level(level: DetailLevel) -> Self {
        match level {
            DetailLevel::Minimal => Self { strategy: Strategy::Summary, ..Default::default() },
            DetailLevel::Normal => Self::default(),
            DetailLevel::Detailed => Self { context_lines: 3, ..Default::default() },
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

static HUNK_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(?P<os>\d+)(,(?P<oc>\d+))? \+(?P<ns>\d+)(,(?P<nc>\d+))? @@").unwrap()
});

pub fn parse_diff(content: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();

    let start_file = |files: &mut Vec<FileDiff>, old: String, new: String| {
        files.push(FileDiff {
            old_path: old,
            new_path: new,
            status: FileStatus::Modified,
            is_binary: false,
            hunks: Vec::new(),
            additions: 0,
            deletions: 0,
        });
    };

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            let mut parts = rest.split_whitespace();
            let old = parts.next().unwrap_or("").trim_start_matches("a/").to_string();
            let new = parts.next().unwrap_or("").trim_start_matches("b/").to_string();
            start_file(&mut files, old, new);
            continue;
        }
        if let Some(caps) = HUNK_HEAD.captures(line) {
            if files.is_empty() {
                start_file(&mut files, "unknown".into(), "unknown".into());
            }
            let file = files.last_mut().unwrap();
            file.hunks.push(Hunk {
                old_start: caps["os"].parse().unwrap_or(0),
                old_count: caps.name("oc").and_then(|m| m.as_str().parse().ok()).unwrap_or(1),
                new_start: caps["ns"].parse().unwrap_or(0),
                new_count: caps.name("nc").and_then(|m| m.as_str().parse().ok()).unwrap_or(1),
                header: line.to_string(),
                lines: Vec::new(),
            });
            continue;
        }

        let in_hunk = files.last().is_some_and(|f| !f.hunks.is_empty());
        match line.chars().next() {
            Some('-') if line.starts_with("--- ") => {
                let path = line[4..].trim_start_matches("a/").to_string();
                match files.last_mut() {
                    // GNU-style diff with no `diff --git` marker.
                    Some(f) if f.hunks.is_empty() && f.old_path != "unknown" => {
                        if path == "/dev/null" {
                            f.status = FileStatus::Added;
                        } else {
                            f.old_path = path;
                        }
                    }
                    _ => {
                        let added = path == "/dev/null";
                        start_file(&mut files, path, String::new());
                        if added {
                            files.last_mut().unwrap().status = FileStatus::Added;
                        }
                    }
                }
            }
            Some('+') if line.starts_with("+++ ") => {
                if let Some(f) = files.last_mut() {
                    let path = line[4..].trim_start_matches("b/").to_string();
                    if path == "/dev/null" {
                        f.status = FileStatus::Deleted;
                    } else {
                        f.new_path = path;
                    }
                }
            }
            Some('+' | '-' | ' ' | '\\') if in_hunk => {
                let file = files.last_mut().unwrap();
                match line.chars().next() {
                    Some('+') => file.additions += 1,
                    Some('-') => file.deletions += 1,
                    _ => {}
                }
                file.hunks.last_mut().unwrap().lines.push(line.to_string());
            }
            _ => {
                let Some(file) = files.last_mut() else { continue };
                if line.starts_with("new file mode") {
                    file.status = FileStatus::Added;
                } else if line.starts_with("deleted file mode") {
                    file.status = FileStatus::Deleted;
                } else if line.starts_with("similarity index") || line.starts_with("rename from") {
                    file.status = FileStatus::Renamed;
                } else if line.starts_with("rename to") {
                    file.new_path = line["rename to ".len()..].to_string();
                } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                    file.is_binary = true;
                }
            }
        }
    }
    files
}

// ── Compression ───────────────────────────────────────────────────────────────

pub fn compress(content: &str, options: &DiffOptions) -> Result<CompressedResult> {
    if options.max_tokens == Some(0) {
        return Err(crate::error::CoreError::InvalidRatio(
            "max_tokens must be positive".into(),
        ));
    }
    let files = parse_diff(content);
    let (compressed, technique, omitted) = match options.strategy {
        Strategy::HunksOnly => (render_hunks(&files, options.context_lines), "diff-hunks", None),
        Strategy::Summary => (render_summary(&files), "diff-summary", None),
        Strategy::Semantic => {
            let budget = options
                .max_tokens
                .unwrap_or_else(|| count_tokens(content) / 2);
            render_semantic(&files, budget)
        }
    };
    Ok(CompressedResult::build(content, compressed, technique, omitted))
}

fn file_header(file: &FileDiff) -> String {
    match file.status {
        FileStatus::Renamed => format!("renamed: {} -> {}", file.old_path, file.new_path),
        FileStatus::Added => format!("added: {}", file.new_path),
        FileStatus::Deleted => format!("deleted: {}", file.old_path),
        FileStatus::Modified => format!("modified: {}", display_path(file)),
    }
}

fn display_path(file: &FileDiff) -> &str {
    if file.new_path.is_empty() { &file.old_path } else { &file.new_path }
}

fn render_hunks(files: &[FileDiff], context_lines: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    for file in files {
        out.push(file_header(file));
        if file.is_binary {
            out.push("  (binary file)".to_string());
            continue;
        }
        for hunk in &file.hunks {
            out.push(hunk.header.clone());
            out.extend(trim_context(&hunk.lines, context_lines));
        }
    }
    out.join("\n")
}

/// Keep changed lines plus `context` surrounding lines; skipped stretches
/// become a bare `…` marker.
fn trim_context(lines: &[String], context: usize) -> Vec<String> {
    let changed: Vec<bool> = lines
        .iter()
        .map(|l| l.starts_with('+') || l.starts_with('-'))
        .collect();
    let keep: Vec<bool> = (0..lines.len())
        .map(|i| {
            let lo = i.saturating_sub(context);
            let hi = (i + context).min(lines.len() - 1);
            changed[lo..=hi].iter().any(|c| *c)
        })
        .collect();

    let mut out = Vec::new();
    let mut skipping = false;
    for (i, line) in lines.iter().enumerate() {
        if keep[i] {
            out.push(line.clone());
            skipping = false;
        } else if !skipping {
            out.push("…".to_string());
            skipping = true;
        }
    }
    out
}

fn render_summary(files: &[FileDiff]) -> String {
    let additions: usize = files.iter().map(|f| f.additions).sum();
    let deletions: usize = files.iter().map(|f| f.deletions).sum();
    let mut out = vec![format!(
        "{} files changed, {additions} additions, {deletions} deletions",
        files.len()
    )];
    for file in files {
        let mut line = format!("{} (+{} -{})", file_header(file), file.additions, file.deletions);
        if file.is_binary {
            line.push_str(" [binary]");
        }
        out.push(line);
    }
    out.join("\n")
}

// ── Semantic ranking ──────────────────────────────────────────────────────────

static ALERT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"error|exception|fail|throw|panic").unwrap());
static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(function|class|interface|type|def|fn|func|struct|enum|trait|impl)\b").unwrap()
});
static TEST_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.test\.|\.spec\.|_test\.|/tests?/").unwrap());

fn render_semantic(files: &[FileDiff], max_tokens: usize) -> (String, &'static str, Option<String>) {
    struct Ranked<'a> {
        file: &'a FileDiff,
        hunk: &'a Hunk,
        score: f64,
        tokens: usize,
        order: usize,
    }

    let all: Vec<(&FileDiff, &Hunk)> = files
        .iter()
        .flat_map(|f| f.hunks.iter().map(move |h| (f, h)))
        .collect();
    let docs: Vec<String> = all.iter().map(|(_, h)| h.text()).collect();
    let tfidf_scores = tfidf::score_documents(&docs);

    let mut ranked: Vec<Ranked> = all
        .iter()
        .enumerate()
        .map(|(i, (file, hunk))| {
            let text = &docs[i];
            let mut score = tfidf_scores.get(i).copied().unwrap_or(0.0);
            if ALERT.is_match(text) {
                score += 0.3;
            }
            if DEFINITION.is_match(text) {
                score += 0.2;
            }
            if TEST_PATH.is_match(display_path(file)) {
                score -= 0.1;
            }
            score += ((hunk.additions() + hunk.deletions()) as f64 / 50.0).min(0.2);
            Ranked { file, hunk, score, tokens: count_tokens(text), order: i }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut budget = max_tokens;
    let mut picked: Vec<&Ranked> = Vec::new();
    for r in &ranked {
        if r.tokens <= budget {
            budget -= r.tokens;
            picked.push(r);
        }
    }
    let omitted = ranked.len() - picked.len();
    // Restore source order for rendering.
    picked.sort_by_key(|r| r.order);

    let mut out: Vec<String> = Vec::new();
    let mut last_file: Option<&str> = None;
    for r in &picked {
        let path = display_path(r.file);
        if last_file != Some(path) {
            out.push(file_header(r.file));
            last_file = Some(path);
        }
        out.push(r.hunk.text());
    }

    let omitted_info = (omitted > 0).then(|| format!("{omitted} lower-ranked hunks omitted"));
    (out.join("\n"), "diff-semantic", omitted_info)
}
