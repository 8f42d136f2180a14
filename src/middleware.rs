/// Middleware chain — before/after/error interceptors around tool calls.
///
/// `before` hooks run in ascending priority and may filter the invocation;
/// `after` hooks run in reverse; `on_error` stops at the first handler that
/// produces a result. A hook that fails is recorded on the invocation
/// context and never stops the chain.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::registry::ToolResponse;

// ── Invocation context ────────────────────────────────────────────────────────

/// Created per `execute`, mutated by before-hooks, discarded after the
/// result returns.
#[derive(Debug)]
pub struct ToolContext {
    pub tool_name: String,
    pub arguments: Value,
    pub start_time: Instant,
    /// Free-form bag middlewares can use to talk to each other.
    pub metadata: HashMap<String, Value>,
    pub middleware_errors: Vec<String>,
}

impl ToolContext {
    pub fn new(tool_name: &str, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments,
            start_time: Instant::now(),
            metadata: HashMap::new(),
            middleware_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeAction {
    Continue,
    /// Skip the tool body and return a synthetic filtered result.
    Filter,
}

// ── Middleware trait ──────────────────────────────────────────────────────────

pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs earlier in `before`, later in `after`.
    fn priority(&self) -> i32 {
        100
    }

    fn before(&self, _ctx: &mut ToolContext) -> anyhow::Result<BeforeAction> {
        Ok(BeforeAction::Continue)
    }

    fn after(&self, _ctx: &mut ToolContext, result: ToolResponse) -> anyhow::Result<ToolResponse> {
        Ok(result)
    }

    /// Return Some to swallow the error and answer with a result instead.
    fn on_error(&self, _ctx: &mut ToolContext, _error: &anyhow::Error) -> Option<ToolResponse> {
        None
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
        self.middlewares.sort_by_key(|m| m.priority());
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Ascending priority. The first filter wins; hook failures are recorded
    /// and skipped.
    pub fn run_before(&self, ctx: &mut ToolContext) -> BeforeAction {
        for mw in &self.middlewares {
            match mw.before(ctx) {
                Ok(BeforeAction::Continue) => {}
                Ok(BeforeAction::Filter) => return BeforeAction::Filter,
                Err(e) => ctx
                    .middleware_errors
                    .push(format!("{} before: {e}", mw.name())),
            }
        }
        BeforeAction::Continue
    }

    /// Descending priority. A failing hook passes the result through
    /// untouched.
    pub fn run_after(&self, ctx: &mut ToolContext, mut result: ToolResponse) -> ToolResponse {
        for mw in self.middlewares.iter().rev() {
            result = match mw.after(ctx, result) {
                Ok(r) => r,
                Err(e) => {
                    ctx.middleware_errors
                        .push(format!("{} after: {e}", mw.name()));
                    // The moved value was consumed by the failing hook; fall
                    // back to an error note so the chain can continue.
                    ToolResponse::error(&format!(
                        "middleware '{}' dropped the result: {e}",
                        mw.name()
                    ))
                }
            };
        }
        result
    }

    /// Ascending priority; first non-None answer wins.
    pub fn run_error(&self, ctx: &mut ToolContext, error: &anyhow::Error) -> Option<ToolResponse> {
        for mw in &self.middlewares {
            if let Some(result) = mw.on_error(ctx, error) {
                return Some(result);
            }
        }
        None
    }
}

// ── Built-in: tracing ─────────────────────────────────────────────────────────

/// Debug-logs every invocation with its duration. Priority 0 so it brackets
/// the whole chain.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn before(&self, ctx: &mut ToolContext) -> anyhow::Result<BeforeAction> {
        tracing::debug!(tool = %ctx.tool_name, "tool invocation start");
        Ok(BeforeAction::Continue)
    }

    fn after(&self, ctx: &mut ToolContext, result: ToolResponse) -> anyhow::Result<ToolResponse> {
        tracing::debug!(
            tool = %ctx.tool_name,
            duration_ms = ctx.start_time.elapsed().as_millis() as u64,
            is_error = result.is_error,
            "tool invocation end"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Recorder {
        name: String,
        priority: i32,
        log: Arc<Mutex<Vec<String>>>,
        filter: bool,
        fail_before: bool,
    }

    impl Recorder {
        fn new(name: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                log: Arc::clone(log),
                filter: false,
                fail_before: false,
            })
        }
    }

    impl Middleware for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn before(&self, _ctx: &mut ToolContext) -> anyhow::Result<BeforeAction> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            if self.fail_before {
                anyhow::bail!("boom");
            }
            if self.filter {
                return Ok(BeforeAction::Filter);
            }
            Ok(BeforeAction::Continue)
        }

        fn after(&self, _ctx: &mut ToolContext, result: ToolResponse) -> anyhow::Result<ToolResponse> {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
            Ok(result)
        }
    }

    #[test]
    fn test_before_ascending_after_descending() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.add(Recorder::new("high", 10, &log));
        chain.add(Recorder::new("low", 1, &log));

        let mut ctx = ToolContext::new("t", serde_json::json!({}));
        assert_eq!(chain.run_before(&mut ctx), BeforeAction::Continue);
        let _ = chain.run_after(&mut ctx, ToolResponse::text("ok"));

        let order = log.lock().unwrap().clone();
        assert_eq!(order, vec!["before:low", "before:high", "after:high", "after:low"]);
    }

    #[test]
    fn test_filter_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        let filtering = Recorder {
            name: "gate".into(),
            priority: 1,
            log: Arc::clone(&log),
            filter: true,
            fail_before: false,
        };
        chain.add(Arc::new(filtering));
        chain.add(Recorder::new("later", 5, &log));

        let mut ctx = ToolContext::new("t", serde_json::json!({}));
        assert_eq!(chain.run_before(&mut ctx), BeforeAction::Filter);
        let order = log.lock().unwrap().clone();
        assert_eq!(order, vec!["before:gate"]);
    }

    #[test]
    fn test_hook_failure_recorded_not_fatal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        let failing = Recorder {
            name: "flaky".into(),
            priority: 1,
            log: Arc::clone(&log),
            filter: false,
            fail_before: true,
        };
        chain.add(Arc::new(failing));
        chain.add(Recorder::new("steady", 5, &log));

        let mut ctx = ToolContext::new("t", serde_json::json!({}));
        assert_eq!(chain.run_before(&mut ctx), BeforeAction::Continue);
        assert_eq!(ctx.middleware_errors.len(), 1);
        assert!(ctx.middleware_errors[0].contains("flaky"));
        let order = log.lock().unwrap().clone();
        assert_eq!(order, vec!["before:flaky", "before:steady"]);
    }

    #[test]
    fn test_on_error_first_answer_wins() {
        struct Handler(i32, &'static str, AtomicUsize);
        impl Middleware for Handler {
            fn name(&self) -> &str {
                self.1
            }
            fn priority(&self) -> i32 {
                self.0
            }
            fn on_error(&self, _ctx: &mut ToolContext, _e: &anyhow::Error) -> Option<ToolResponse> {
                self.2.fetch_add(1, Ordering::SeqCst);
                Some(ToolResponse::text(self.1))
            }
        }

        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Handler(1, "first", AtomicUsize::new(0))));
        chain.add(Arc::new(Handler(2, "second", AtomicUsize::new(0))));

        let mut ctx = ToolContext::new("t", serde_json::json!({}));
        let err = anyhow::anyhow!("kaput");
        let result = chain.run_error(&mut ctx, &err).unwrap();
        assert_eq!(result.full_text(), "first");
    }
}
