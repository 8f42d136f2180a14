/// Conversation compressor — shrink chat history without losing the thread.
///
/// The last N messages always survive, system messages optionally so; the
/// truncated span is replaced by a single synthesized system message built by
/// one of three strategies. All summarisation is deterministic — no model
/// calls to save model tokens.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::CompressedResult;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStrategy {
    RollingSummary,
    KeyExtraction,
    #[default]
    Hybrid,
}

impl ConversationStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rolling-summary" => Some(Self::RollingSummary),
            "key-extraction" => Some(Self::KeyExtraction),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    fn technique(&self) -> &'static str {
        match self {
            Self::RollingSummary => "conversation-rolling-summary",
            Self::KeyExtraction => "conversation-key-extraction",
            Self::Hybrid => "conversation-hybrid",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationOptions {
    pub strategy: ConversationStrategy,
    /// Most recent messages kept verbatim.
    pub keep_last: usize,
    pub preserve_system: bool,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            strategy: ConversationStrategy::default(),
            keep_last: 5,
            preserve_system: true,
        }
    }
}

// ── Heuristics ────────────────────────────────────────────────────────────────

static ASSISTANT_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(I |I'll |I will |Created |Fixed |Updated |Added |Removed |Renamed |Implemented |Done)").unwrap()
});
static FILE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w./-]+\.(ts|tsx|js|jsx|py|go|rs|php|swift|json|toml|yaml|yml|md)\b").unwrap());
static IMPORTANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"decided|will use|should|must|critical").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*•]|\d+[.)])\s+").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

fn first_meaningful_line(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
}

fn important_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| {
            IMPORTANT.is_match(l)
                || l.contains('`')
                || BULLET.is_match(l)
                || FILE_REF.is_match(l)
                || URL.is_match(l)
        })
        .map(|l| l.to_string())
        .collect()
}

fn prose_summary(span: &[Message]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut files: Vec<String> = Vec::new();
    for msg in span {
        match msg.role.as_str() {
            "user" => {
                if let Some(line) = first_meaningful_line(&msg.content) {
                    lines.push(format!("User asked: {line}"));
                }
            }
            "assistant" => {
                if let Some(line) = first_meaningful_line(&msg.content) {
                    if ASSISTANT_ACTION.is_match(line) {
                        lines.push(format!("Assistant: {line}"));
                    }
                }
            }
            _ => {}
        }
        for m in FILE_REF.find_iter(&msg.content) {
            let f = m.as_str().to_string();
            if !files.contains(&f) {
                files.push(f);
            }
        }
    }
    if !files.is_empty() {
        lines.push(format!("Files discussed: {}", files.join(", ")));
    }
    lines
}

fn extraction_summary(span: &[Message]) -> Vec<String> {
    let mut bullets = Vec::new();
    for msg in span {
        for line in important_lines(&msg.content) {
            let bullet = format!("- {line}");
            if !bullets.contains(&bullet) {
                bullets.push(bullet);
            }
        }
    }
    bullets
}

// ── Compression ───────────────────────────────────────────────────────────────

fn render(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the new message list plus the usual accounting over the rendered
/// transcripts.
pub fn compress_messages(
    messages: &[Message],
    options: &ConversationOptions,
) -> Result<(Vec<Message>, CompressedResult)> {
    let original = render(messages);
    let keep_from = messages.len().saturating_sub(options.keep_last);
    let (span, tail) = messages.split_at(keep_from);

    let compressible: Vec<&Message> = span
        .iter()
        .filter(|m| !(options.preserve_system && m.role == "system"))
        .collect();

    if compressible.is_empty() {
        let result =
            CompressedResult::build(&original, original.clone(), options.strategy.technique(), None);
        return Ok((messages.to_vec(), result));
    }

    let span_owned: Vec<Message> = compressible.iter().map(|m| (*m).clone()).collect();
    let summary_lines = match options.strategy {
        ConversationStrategy::RollingSummary => prose_summary(&span_owned),
        ConversationStrategy::KeyExtraction => extraction_summary(&span_owned),
        ConversationStrategy::Hybrid => {
            let mut lines = prose_summary(&span_owned);
            for bullet in extraction_summary(&span_owned) {
                if !lines.contains(&bullet) {
                    lines.push(bullet);
                }
            }
            lines
        }
    };

    let synthesized = Message::new(
        "system",
        format!(
            "[Earlier conversation compressed — {} messages]\n{}",
            span_owned.len(),
            summary_lines.join("\n")
        ),
    );

    let mut out: Vec<Message> = Vec::new();
    if options.preserve_system {
        out.extend(span.iter().filter(|m| m.role == "system").cloned());
    }
    out.push(synthesized);
    out.extend(tail.iter().cloned());

    let compressed = render(&out);
    let result =
        CompressedResult::build(&original, compressed, options.strategy.technique(), None);
    Ok((out, result))
}
