/// Session tracker — process-wide aggregate counters.
///
/// Fed by the registry's after-path. Counters only grow; `reset()` zeroes
/// everything and restarts the clock. Totals are derived from the per-tool
/// stats so the two can never drift apart.
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolStats {
    pub invocations: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub tokens_saved: u64,
    pub total_duration_ms: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub start_time: DateTime<Utc>,
    pub total_invocations: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub total_tokens_saved: u64,
    pub total_errors: u64,
    /// tokens_saved / tokens_in, 0 when nothing came in yet.
    pub optimization_rate: f64,
    pub tools: HashMap<String, ToolStats>,
}

struct Inner {
    start_time: DateTime<Utc>,
    tools: HashMap<String, ToolStats>,
}

pub struct SessionTracker {
    inner: Mutex<Inner>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { start_time: Utc::now(), tools: HashMap::new() }),
        }
    }

    pub fn record(
        &self,
        tool: &str,
        tokens_in: usize,
        tokens_out: usize,
        tokens_saved: usize,
        duration_ms: u64,
        is_error: bool,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let stats = inner.tools.entry(tool.to_string()).or_default();
        stats.invocations += 1;
        stats.tokens_in += tokens_in as u64;
        stats.tokens_out += tokens_out as u64;
        stats.tokens_saved += tokens_saved as u64;
        stats.total_duration_ms += duration_ms;
        if is_error {
            stats.errors += 1;
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.tools.clear();
        inner.start_time = Utc::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().unwrap();
        let sum = |f: fn(&ToolStats) -> u64| inner.tools.values().map(f).sum::<u64>();
        let total_tokens_in = sum(|t| t.tokens_in);
        let total_tokens_saved = sum(|t| t.tokens_saved);
        SessionSnapshot {
            start_time: inner.start_time,
            total_invocations: sum(|t| t.invocations),
            total_tokens_in,
            total_tokens_out: sum(|t| t.tokens_out),
            total_tokens_saved,
            total_errors: sum(|t| t.errors),
            optimization_rate: if total_tokens_in > 0 {
                total_tokens_saved as f64 / total_tokens_in as f64
            } else {
                0.0
            },
            tools: inner.tools.clone(),
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_equal_per_tool_sums() {
        let tracker = SessionTracker::new();
        tracker.record("compress_text", 100, 40, 60, 3, false);
        tracker.record("compress_text", 50, 20, 30, 2, false);
        tracker.record("parse_code", 80, 70, 0, 5, true);

        let snap = tracker.snapshot();
        assert_eq!(snap.total_invocations, 3);
        assert_eq!(
            snap.total_invocations,
            snap.tools.values().map(|t| t.invocations).sum::<u64>()
        );
        assert_eq!(snap.total_tokens_in, 230);
        assert_eq!(snap.total_tokens_saved, 90);
        assert_eq!(snap.total_errors, 1);
        assert!((snap.optimization_rate - 90.0 / 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_counters_are_monotone() {
        let tracker = SessionTracker::new();
        tracker.record("t", 10, 5, 1, 1, false);
        let first = tracker.snapshot();
        tracker.record("t", 10, 5, 1, 1, false);
        let second = tracker.snapshot();
        assert!(second.total_tokens_in >= first.total_tokens_in);
        assert!(second.total_invocations > first.total_invocations);
    }

    #[test]
    fn test_reset_zeroes_and_restarts_clock() {
        let tracker = SessionTracker::new();
        tracker.record("t", 10, 5, 1, 1, false);
        let before = tracker.snapshot();
        tracker.reset();
        let after = tracker.snapshot();
        assert_eq!(after.total_invocations, 0);
        assert_eq!(after.optimization_rate, 0.0);
        assert!(after.start_time >= before.start_time);
    }
}
