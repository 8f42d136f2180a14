/// Structured log summarization tool.
use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{note_savings, ToolDeps};
use crate::middleware::ToolContext;
use crate::summarize::{summarize, SummarizeOptions};
use crate::tokens::count_tokens;

pub fn definition() -> Value {
    json!({
        "name": "summarize_logs",
        "description": "Build a structured log summary: overview, top errors/warnings, key events, level statistics, message patterns and clusters.",
        "parameters": {
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Raw log content" },
                "max_items": { "type": "integer", "description": "Cap on listed errors/warnings/events (default 10)" }
            },
            "required": ["text"]
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute(_deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let text = args["text"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("summarize_logs: missing 'text'"))?;
    let mut options = SummarizeOptions::default();
    if let Some(n) = args["max_items"].as_u64() {
        options.max_items = n as usize;
    }
    let summary = summarize(text, &options);
    let rendered = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    note_savings(ctx, count_tokens(text), count_tokens(&rendered));
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::core_registry;
    use serde_json::json;

    #[test]
    fn test_summary_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let log = "\
2024-03-01T10:00:00 [INFO] boot
2024-03-01T10:00:05 [ERROR] db refused connection
2024-03-01T10:00:06 [INFO] retry scheduled
";
        let response = registry.execute("summarize_logs", json!({"text": log}));
        assert!(!response.is_error);
        let summary: serde_json::Value = serde_json::from_str(&response.full_text()).unwrap();
        assert_eq!(summary["statistics"]["errors"], json!(1));
        assert!(summary["overview"].as_str().unwrap().contains("3 entries"));
        assert!(!summary["errors"].as_array().unwrap().is_empty());
    }
}
