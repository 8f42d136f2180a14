/// Build-output parsing tool.
use anyhow::Result;
use serde_json::{json, Value};

use super::{note_savings, ToolDeps};
use crate::build_output::{group_errors, parse_build_output, render_groups};
use crate::middleware::ToolContext;
use crate::tokens::count_tokens;

pub fn definition() -> Value {
    json!({
        "name": "parse_build_output",
        "description": "Parse compiler/linter output (tsc, eslint, bundlers, cargo, go, generic) into deduplicated error groups sorted by count.",
        "parameters": {
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Raw build or lint output" }
            },
            "required": ["text"]
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute(_deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let text = args["text"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("parse_build_output: missing 'text'"))?;
    let errors = parse_build_output(text);
    let groups = group_errors(&errors);
    let rendered = render_groups(&groups);
    note_savings(ctx, count_tokens(text), count_tokens(&rendered));
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::core_registry;
    use serde_json::json;

    #[test]
    fn test_groups_duplicate_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let log = "\
src/a.ts(1,1): error TS2345: Argument of type 'A' is not assignable to parameter of type 'B'.
src/b.ts(9,2): error TS2345: Argument of type 'C' is not assignable to parameter of type 'D'.
src/c.ts(4,4): error TS2304: Cannot find name 'x'.
";
        let response = registry.execute("parse_build_output", json!({"text": log}));
        assert!(!response.is_error);
        let text = response.full_text();
        assert!(text.contains("TS2345 ×2"));
        assert!(text.contains("TS2304 ×1"));
    }

    #[test]
    fn test_clean_output() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("parse_build_output", json!({"text": "all good\n"}));
        assert!(response.full_text().contains("No errors"));
    }
}
