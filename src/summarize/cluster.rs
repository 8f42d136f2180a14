/// Single-linkage clustering of log messages.
///
/// Messages join a cluster when they sit above the similarity threshold to
/// any existing member (greedy single linkage). Two metrics: Levenshtein
/// similarity over characters or Jaccard over word tokens. Re-clustering the
/// representatives at a lowered threshold builds a hierarchy of up to three
/// levels.
use serde::Serialize;

use crate::compress::logs::{normalize_message, LogLevel};

use super::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    #[default]
    Levenshtein,
    Jaccard,
}

#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub metric: SimilarityMetric,
    pub threshold: f64,
    pub max_clusters: usize,
    /// Hierarchy depth, capped at 3.
    pub levels: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            threshold: 0.7,
            max_clusters: 100,
            levels: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogCluster {
    /// Normalized message of the representative.
    pub pattern: String,
    /// Indices into the entry slice handed to `cluster`.
    pub entries: Vec<usize>,
    pub representative: String,
    pub dominant_level: LogLevel,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterHierarchy {
    /// `levels[0]` is the finest clustering; each next level re-clusters the
    /// previous level's representatives at a lower threshold.
    pub levels: Vec<Vec<LogCluster>>,
}

// ── Distances ─────────────────────────────────────────────────────────────────

/// Two-row Levenshtein, O(|a|·|b|) time, O(min) memory.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max = a.chars().count().max(b.chars().count());
    if max == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max as f64
}

pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let inter = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    inter as f64 / union as f64
}

fn similarity(metric: SimilarityMetric, a: &str, b: &str) -> f64 {
    match metric {
        SimilarityMetric::Levenshtein => levenshtein_similarity(a, b),
        SimilarityMetric::Jaccard => jaccard_similarity(a, b),
    }
}

// ── Clustering ────────────────────────────────────────────────────────────────

/// Greedy single-linkage pass over the entries; `scores` must be parallel to
/// `entries` (see `score::score_entries`).
pub fn cluster(
    entries: &[LogEntry],
    scores: &[f64],
    options: &ClusterOptions,
) -> Vec<LogCluster> {
    let normalized: Vec<String> =
        entries.iter().map(|e| normalize_message(&e.message)).collect();

    // member lists over normalized-message indices
    let mut members: Vec<Vec<usize>> = Vec::new();
    for (i, norm) in normalized.iter().enumerate() {
        let joined = members.iter_mut().find(|cluster| {
            cluster
                .iter()
                .any(|&j| similarity(options.metric, norm, &normalized[j]) >= options.threshold)
        });
        match joined {
            Some(cluster) => cluster.push(i),
            None => members.push(vec![i]),
        }
    }

    let mut clusters: Vec<LogCluster> = members
        .into_iter()
        .map(|idxs| {
            let best = idxs
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    scores[a].partial_cmp(&scores[b]).unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(idxs[0]);

            // Plurality level.
            let mut level_counts: Vec<(LogLevel, usize)> = Vec::new();
            for &i in &idxs {
                match level_counts.iter_mut().find(|(l, _)| *l == entries[i].level) {
                    Some((_, n)) => *n += 1,
                    None => level_counts.push((entries[i].level, 1)),
                }
            }
            let dominant_level = level_counts
                .iter()
                .max_by_key(|(_, n)| *n)
                .map(|(l, _)| *l)
                .unwrap_or(LogLevel::Other);

            let avg_score: f64 =
                idxs.iter().map(|&i| scores[i]).sum::<f64>() / idxs.len() as f64;
            let size_bonus = (idxs.len() as f64 / 20.0).min(0.3);
            let level_bonus = match dominant_level {
                LogLevel::Error => 0.2,
                LogLevel::Warn => 0.1,
                _ => 0.0,
            };
            LogCluster {
                pattern: normalized[best].clone(),
                representative: entries[best].raw.clone(),
                entries: idxs,
                dominant_level,
                importance: (avg_score + size_bonus + level_bonus).clamp(0.0, 1.0),
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters.truncate(options.max_clusters);
    clusters
}

/// Build up to three levels, each re-clustering the previous level's
/// representatives at a threshold lowered by 0.15.
pub fn cluster_hierarchy(
    entries: &[LogEntry],
    scores: &[f64],
    options: &ClusterOptions,
) -> ClusterHierarchy {
    let mut levels_out: Vec<Vec<LogCluster>> = Vec::new();
    let mut opts = options.clone();
    let depth = options.levels.clamp(1, 3);

    let mut current = cluster(entries, scores, &opts);
    levels_out.push(current.clone());

    for _ in 1..depth {
        if current.len() <= 1 {
            break;
        }
        opts.threshold = (opts.threshold - 0.15).max(0.1);
        // Representatives become the next level's entries.
        let rep_entries: Vec<LogEntry> = current
            .iter()
            .map(|c| LogEntry {
                timestamp: None,
                level: c.dominant_level,
                message: c.pattern.clone(),
                raw: c.representative.clone(),
            })
            .collect();
        let rep_scores: Vec<f64> = current.iter().map(|c| c.importance).collect();
        current = cluster(&rep_entries, &rep_scores, &opts);
        levels_out.push(current.clone());
    }

    ClusterHierarchy { levels: levels_out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::{parse_entries, score::ScoreWeights};

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert!((levenshtein_similarity("abcd", "abcd") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard_basics() {
        assert!((jaccard_similarity("a b c", "a b c") - 1.0).abs() < 1e-9);
        assert!((jaccard_similarity("a b", "c d") - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_similar_messages_cluster_together() {
        let content = "\
[INFO] served request 1 in 10ms
[INFO] served request 2 in 14ms
[INFO] served request 3 in 12ms
[ERROR] upstream timeout talking to billing
";
        let entries = parse_entries(content);
        let scores = crate::summarize::score::score_entries(&entries, &ScoreWeights::default());
        let clusters = cluster(&entries, &scores, &ClusterOptions::default());
        assert_eq!(clusters.len(), 2);
        let error_cluster = clusters.iter().find(|c| c.dominant_level == LogLevel::Error).unwrap();
        assert_eq!(error_cluster.entries.len(), 1);
        // Error cluster outranks the info cluster despite its size.
        assert_eq!(clusters[0].dominant_level, LogLevel::Error);
    }

    #[test]
    fn test_max_clusters_cap() {
        let mut content = String::new();
        for i in 0..10 {
            content.push_str(&format!("[INFO] totally distinct shape number {i} — {}\n", "x".repeat(i * 7)));
        }
        let entries = parse_entries(&content);
        let scores = vec![0.5; entries.len()];
        let clusters = cluster(
            &entries,
            &scores,
            &ClusterOptions { threshold: 0.99, max_clusters: 4, ..Default::default() },
        );
        assert!(clusters.len() <= 4);
    }

    #[test]
    fn test_hierarchy_levels() {
        let content = "\
[INFO] cache hit for key alpha
[INFO] cache hit for key beta
[INFO] cache miss for key gamma
[ERROR] cache backend down
";
        let entries = parse_entries(content);
        let scores = vec![0.5; entries.len()];
        let h = cluster_hierarchy(
            &entries,
            &scores,
            &ClusterOptions { levels: 3, ..Default::default() },
        );
        assert!(!h.levels.is_empty() && h.levels.len() <= 3);
        // Coarser levels never have more clusters than finer ones.
        for w in h.levels.windows(2) {
            assert!(w[1].len() <= w[0].len());
        }
    }
}
