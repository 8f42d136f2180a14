/// Cache and session statistics tools.
use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::ToolDeps;
use crate::middleware::ToolContext;

pub fn cache_definition() -> Value {
    json!({
        "name": "cache_stats",
        "description": "Cache statistics: hits, misses, hit rate, evictions, invalidations, memory footprint.",
        "parameters": { "type": "object", "properties": {} },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_cache(deps: &ToolDeps, _ctx: &mut ToolContext, _args: &Value) -> Result<String> {
    let stats = deps.bridge.cache.stats();
    serde_json::to_string_pretty(&stats).context("serialize cache stats")
}

pub fn session_definition() -> Value {
    json!({
        "name": "session_stats",
        "description": "Session totals: per-tool invocations, tokens in/out/saved, errors, optimization rate.",
        "parameters": { "type": "object", "properties": {} },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_session(deps: &ToolDeps, _ctx: &mut ToolContext, _args: &Value) -> Result<String> {
    let snapshot = deps.bridge.session.snapshot();
    serde_json::to_string_pretty(&snapshot).context("serialize session stats")
}
