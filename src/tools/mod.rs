/// Core tool definitions registered into the registry at startup.
///
/// Each module declares its tools as a json! schema plus an execute function
/// taking the shared dependencies; this table wires them together. Tool
/// descriptions are deliberately terse — the serialized listing for all core
/// tools must stay under the token budget enforced in the tests below.
pub mod build;
pub mod code;
pub mod compress;
pub mod logs;
pub mod script;
pub mod stats;

use std::sync::Arc;

use serde_json::Value;

use crate::middleware::ToolContext;
use crate::registry::{ToolAnnotations, ToolDefinition, ToolRegistry};
use crate::sandbox::{ScriptRuntime, SdkBridge};

/// Everything a tool handler may need, shared behind one Arc.
pub struct ToolDeps {
    pub bridge: Arc<SdkBridge>,
    pub runtime: ScriptRuntime,
}

type Exec = fn(&ToolDeps, &mut ToolContext, &Value) -> anyhow::Result<String>;

/// All core tools in listing order.
fn table() -> Vec<(Value, Exec)> {
    vec![
        (compress::text_definition(), compress::execute_text),
        (compress::file_definition(), compress::execute_file),
        (compress::diff_definition(), compress::execute_diff),
        (compress::conversation_definition(), compress::execute_conversation),
        (code::parse_definition(), code::execute_parse),
        (code::extract_definition(), code::execute_extract),
        (code::skeleton_definition(), code::execute_skeleton),
        (code::search_definition(), code::execute_search),
        (build::definition(), build::execute),
        (logs::definition(), logs::execute),
        (script::definition(), script::execute),
        (stats::cache_definition(), stats::execute_cache),
        (stats::session_definition(), stats::execute_session),
    ]
}

pub fn register_all(registry: &mut ToolRegistry, deps: Arc<ToolDeps>) {
    for (definition, exec) in table() {
        registry.register(to_tool(definition, Arc::clone(&deps), exec));
    }
}

/// Build a `ToolDefinition` from the json declaration.
fn to_tool(v: Value, deps: Arc<ToolDeps>, exec: Exec) -> ToolDefinition {
    let annotations = v
        .get("annotations")
        .map(|a| ToolAnnotations {
            title: a.get("title").and_then(Value::as_str).map(str::to_string),
            read_only_hint: a.get("readOnlyHint").and_then(Value::as_bool),
            destructive_hint: a.get("destructiveHint").and_then(Value::as_bool),
            idempotent_hint: a.get("idempotentHint").and_then(Value::as_bool),
            long_running_hint: a.get("longRunningHint").and_then(Value::as_bool),
        })
        .unwrap_or_default();
    ToolDefinition {
        name: v["name"].as_str().unwrap_or("").to_string(),
        description: v["description"].as_str().unwrap_or("").to_string(),
        input_schema: v["parameters"].clone(),
        output_schema: None,
        annotations,
        handler: Arc::new(move |ctx, args| exec(&deps, ctx, args)),
    }
}

// ── Shared handler helpers ────────────────────────────────────────────────────

/// Record how many tokens a compression saved so the registry can feed the
/// session tracker.
pub(crate) fn note_savings(ctx: &mut ToolContext, original_tokens: usize, compressed_tokens: usize) {
    let saved = original_tokens.saturating_sub(compressed_tokens);
    ctx.metadata
        .insert("tokens_saved".into(), serde_json::json!(saved));
}

/// Standard header line prefixed to compressed payloads.
pub(crate) fn stats_header(stats: &crate::compress::CompressStats) -> String {
    format!(
        "[{}: {} -> {} tokens, {}% reduction]",
        stats.technique, stats.original_tokens, stats.compressed_tokens, stats.reduction_percent
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::count_tokens;

    /// Hard ceiling for the serialized core-tool listing.
    const LISTING_TOKEN_BUDGET: usize = 2200;

    #[test]
    fn test_all_tools_registered() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = test_support::core_registry(dir.path());
        let names = registry.tool_names();
        for expected in [
            "compress_text",
            "compress_file",
            "compress_diff",
            "compress_conversation",
            "parse_code",
            "extract_code",
            "code_skeleton",
            "search_code",
            "parse_build_output",
            "summarize_logs",
            "run_script",
            "cache_stats",
            "session_stats",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn test_listing_stays_under_token_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = test_support::core_registry(dir.path());
        let listing = registry.list_tools().to_string();
        let tokens = count_tokens(&listing);
        assert!(
            tokens <= LISTING_TOKEN_BUDGET,
            "tool listing is {tokens} tokens, budget {LISTING_TOKEN_BUDGET}"
        );
    }

    #[test]
    fn test_every_tool_has_schema_and_description() {
        for (definition, _) in super::table() {
            assert!(definition["name"].as_str().unwrap().len() > 2);
            assert!(!definition["description"].as_str().unwrap().is_empty());
            assert_eq!(definition["parameters"]["type"], "object");
        }
    }
}
