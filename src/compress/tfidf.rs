/// TF-IDF scoring — how distinctive is each document's vocabulary relative
/// to the collection? Scores are normalized to [0,1]; a single-document
/// collection scores 0 because nothing distinguishes it.
use std::collections::HashMap;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.len() > 1)
        .map(|w| w.to_lowercase())
        .collect()
}

/// One score per input document, higher = more distinctive vocabulary.
pub fn score_documents(docs: &[String]) -> Vec<f64> {
    if docs.is_empty() {
        return Vec::new();
    }
    let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();

    // Document frequency per term.
    let mut df: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let mut seen: Vec<&str> = Vec::new();
        for t in tokens {
            if !seen.contains(&t.as_str()) {
                seen.push(t);
                *df.entry(t).or_insert(0) += 1;
            }
        }
    }

    let n = docs.len() as f64;
    let mut raw: Vec<f64> = tokenized
        .iter()
        .map(|tokens| {
            if tokens.is_empty() {
                return 0.0;
            }
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for t in tokens {
                *tf.entry(t).or_insert(0) += 1;
            }
            let total = tokens.len() as f64;
            tf.iter()
                .map(|(term, count)| {
                    let idf = (n / (1.0 + df.get(term).copied().unwrap_or(0) as f64)).ln().max(0.0);
                    (*count as f64 / total) * idf
                })
                .sum::<f64>()
        })
        .collect();

    let max = raw.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        for score in raw.iter_mut() {
            *score /= max;
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_in_unit_range() {
        let docs = vec![
            "shared words shared words".to_string(),
            "shared words plus rare vocabulary".to_string(),
            "completely distinct esoteric terminology here".to_string(),
        ];
        let scores = score_documents(&docs);
        assert_eq!(scores.len(), 3);
        for s in &scores {
            assert!((0.0..=1.0).contains(s));
        }
    }

    #[test]
    fn test_distinct_doc_scores_highest() {
        let docs = vec![
            "the cat sat on the mat".to_string(),
            "the cat sat on the rug".to_string(),
            "quantum chromodynamics lagrangian perturbation".to_string(),
        ];
        let scores = score_documents(&docs);
        assert!(scores[2] >= scores[0]);
        assert!(scores[2] >= scores[1]);
        assert!((scores[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(score_documents(&[]).is_empty());
        let scores = score_documents(&["".to_string(), "words here".to_string()]);
        assert_eq!(scores[0], 0.0);
    }
}
