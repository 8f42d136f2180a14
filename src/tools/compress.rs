/// Compression tools: text blobs, files, diffs and conversations.
use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{note_savings, stats_header, ToolDeps};
use crate::middleware::ToolContext;

pub fn text_definition() -> Value {
    json!({
        "name": "compress_text",
        "description": "Compress a text blob (auto-detects logs, stacktraces, diffs, config, code). Returns the compressed text with accounting stats.",
        "parameters": {
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Content to compress" },
                "type": { "type": "string", "enum": ["code", "logs", "stacktrace", "diff", "config", "generic"], "description": "Optional content-type hint" },
                "level": { "type": "string", "enum": ["minimal", "normal", "detailed"] },
                "preserve": { "type": "array", "items": { "type": "string" }, "description": "Regexes whose matching lines are never dropped" }
            },
            "required": ["text"]
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute_text(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let result = deps
        .bridge
        .dispatch("compress.auto", args)
        .context("compress_text")?;
    render_compressed(ctx, &result)
}

pub fn file_definition() -> Value {
    json!({
        "name": "compress_file",
        "description": "Read a file (relative to the working dir) and compress it by its detected type.",
        "parameters": {
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to the working dir" },
                "level": { "type": "string", "enum": ["minimal", "normal", "detailed"] }
            },
            "required": ["path"]
        },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_file(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let read = deps
        .bridge
        .dispatch("files.read", args)
        .context("compress_file")?;
    let request = json!({
        "text": read["content"],
        "path": args["path"],
        "level": args["level"],
    });
    let result = deps
        .bridge
        .dispatch("compress.auto", &request)
        .context("compress_file")?;
    render_compressed(ctx, &result)
}

pub fn diff_definition() -> Value {
    json!({
        "name": "compress_diff",
        "description": "Compress a unified diff: hunks-only, summary, or semantic ranking packed into a token budget.",
        "parameters": {
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Unified diff content" },
                "strategy": { "type": "string", "enum": ["hunks-only", "summary", "semantic"] },
                "max_tokens": { "type": "integer", "description": "Semantic budget; default 50% of input" },
                "level": { "type": "string", "enum": ["minimal", "normal", "detailed"] }
            },
            "required": ["text"]
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute_diff(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let result = deps
        .bridge
        .dispatch("compress.diff", args)
        .context("compress_diff")?;
    render_compressed(ctx, &result)
}

pub fn conversation_definition() -> Value {
    json!({
        "name": "compress_conversation",
        "description": "Shrink a chat history, keeping system messages and the last N turns, replacing the rest with a synthesized summary message.",
        "parameters": {
            "type": "object",
            "properties": {
                "messages": { "type": "array", "items": { "type": "object" }, "description": "{role, content} messages" },
                "strategy": { "type": "string", "enum": ["rolling-summary", "key-extraction", "hybrid"] },
                "keep_last": { "type": "integer" },
                "preserve_system": { "type": "boolean" }
            },
            "required": ["messages"]
        },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_conversation(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let result = deps
        .bridge
        .dispatch("conversation.compress", args)
        .context("compress_conversation")?;
    let stats = &result["stats"];
    let original = stats["original_tokens"].as_u64().unwrap_or(0) as usize;
    let compressed = stats["compressed_tokens"].as_u64().unwrap_or(0) as usize;
    note_savings(ctx, original, compressed);
    serde_json::to_string_pretty(&result).context("serialize conversation result")
}

/// Shared rendering for CompressedResult-shaped values: header + payload.
fn render_compressed(ctx: &mut ToolContext, result: &Value) -> Result<String> {
    let stats: crate::compress::CompressStats = serde_json::from_value(result["stats"].clone())
        .context("compressed result missing stats")?;
    note_savings(ctx, stats.original_tokens, stats.compressed_tokens);
    let mut out = stats_header(&stats);
    if let Some(omitted) = result["omitted_info"].as_str() {
        out.push_str(&format!("\n[omitted: {omitted}]"));
    }
    out.push('\n');
    out.push_str(result["compressed"].as_str().unwrap_or_default());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::core_registry;
    use serde_json::json;

    #[test]
    fn test_compress_text_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, session) = core_registry(dir.path());
        let log = "[INFO] tick 1\n".repeat(40) + "[ERROR] boom\n";
        let response = registry.execute("compress_text", json!({"text": log}));
        assert!(!response.is_error);
        let text = response.full_text();
        assert!(text.starts_with("[logs:"));
        assert!(text.contains("boom"));

        let snap = session.snapshot();
        assert_eq!(snap.total_invocations, 1);
        assert!(snap.total_tokens_saved > 0);
    }

    #[test]
    fn test_compress_file_validates_path() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("compress_file", json!({"path": "../etc/passwd"}));
        assert!(response.is_error);
        let response = registry.execute("compress_file", json!({"path": "absent.log"}));
        assert!(response.is_error);
        assert!(response.full_text().contains("not found"));
    }

    #[test]
    fn test_compress_diff_summary() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let diff = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";
        let response =
            registry.execute("compress_diff", json!({"text": diff, "strategy": "summary"}));
        assert!(!response.is_error);
        assert!(response.full_text().contains("1 files changed"));
    }

    #[test]
    fn test_compress_conversation_tool() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let messages: Vec<serde_json::Value> = (0..10)
            .map(|i| json!({"role": if i % 2 == 0 { "user" } else { "assistant" }, "content": format!("turn {i}")}))
            .collect();
        let response = registry.execute(
            "compress_conversation",
            json!({"messages": messages, "keep_last": 2}),
        );
        assert!(!response.is_error);
        assert!(response.full_text().contains("messages"));
    }
}
