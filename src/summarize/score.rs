/// Log-entry scoring — rank lines by how much an assistant needs them.
///
/// Four sub-scores, each in [0,1]: severity level, message TF-IDF,
/// U-shaped position (starts and ends matter), and rarity of the
/// normalized pattern. Combined as a weighted sum and clamped.
use crate::compress::logs::LogLevel;
use crate::compress::{logs::normalize_message, tfidf};

use super::LogEntry;

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub level: f64,
    pub tfidf: f64,
    pub position: f64,
    pub rarity: f64,
    /// Entries this close to either end get the position boost.
    pub edge_window: usize,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { level: 0.3, tfidf: 0.3, position: 0.2, rarity: 0.2, edge_window: 5 }
    }
}

fn level_score(level: LogLevel) -> f64 {
    match level {
        LogLevel::Error => 1.0,
        LogLevel::Warn => 0.7,
        LogLevel::Info => 0.3,
        LogLevel::Debug | LogLevel::Trace => 0.1,
        LogLevel::Other => 0.3,
    }
}

/// U-shaped: 1.0 at the very first/last entry, decaying linearly across the
/// edge window, flat 0.2 in the middle.
fn position_score(index: usize, total: usize, window: usize) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    let from_edge = index.min(total - 1 - index);
    if from_edge < window {
        1.0 - (from_edge as f64 / window as f64) * 0.8
    } else {
        0.2
    }
}

/// One score per entry, order preserved.
pub fn score_entries(entries: &[LogEntry], weights: &ScoreWeights) -> Vec<f64> {
    if entries.is_empty() {
        return Vec::new();
    }
    let messages: Vec<String> = entries.iter().map(|e| e.message.clone()).collect();
    let tfidf_scores = tfidf::score_documents(&messages);

    // Pattern frequency for the rarity term.
    let patterns: Vec<String> = entries.iter().map(|e| normalize_message(&e.message)).collect();
    let mut freq: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for p in &patterns {
        *freq.entry(p).or_insert(0) += 1;
    }
    let max_freq = freq.values().copied().max().unwrap_or(1) as f64;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let rarity = 1.0 - freq[patterns[i].as_str()] as f64 / max_freq;
            let combined = weights.level * level_score(entry.level)
                + weights.tfidf * tfidf_scores.get(i).copied().unwrap_or(0.0)
                + weights.position * position_score(i, entries.len(), weights.edge_window)
                + weights.rarity * rarity;
            combined.clamp(0.0, 1.0)
        })
        .collect()
}
