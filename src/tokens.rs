/// Token counting — the accounting unit for every stats field in the crate.
///
/// Uses the cl100k BPE encoding. The encoder is built once from embedded
/// vocabulary data and shared; counting is deterministic, thread-safe and
/// O(|s|). Compressors, the cache, the registry and the session tracker all
/// route through `count_tokens` — character or word counts are never used
/// for accounting, only for explicitly-labelled estimates.
use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

static BPE: Lazy<CoreBPE> = Lazy::new(|| {
    // Vocabulary data ships inside the crate; construction cannot fail at
    // runtime for the embedded encodings.
    tiktoken_rs::cl100k_base().expect("embedded cl100k vocabulary")
});

/// Count BPE tokens in a string.
pub fn count_tokens(s: &str) -> usize {
    if s.is_empty() {
        return 0;
    }
    BPE.encode_with_special_tokens(s).len()
}

/// Count tokens of a JSON value as it would appear on the wire.
pub fn count_json_tokens(value: &serde_json::Value) -> usize {
    count_tokens(&value.to_string())
}
