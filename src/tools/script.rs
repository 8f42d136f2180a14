/// Sandboxed script execution tool.
use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::ToolDeps;
use crate::middleware::ToolContext;

pub fn definition() -> Value {
    json!({
        "name": "run_script",
        "description": "Run a JavaScript snippet in the sandbox with the SDK (files, compress, code, utils, git, search, analyze, multifile, conversation, pipe). The completion value is the result.",
        "parameters": {
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Script source" }
            },
            "required": ["code"]
        },
        "annotations": { "longRunningHint": true }
    })
}

pub fn execute(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let code = args["code"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("run_script: missing 'code'"))?;
    let result = deps.runtime.execute(code).context("run_script")?;
    if result.compressed {
        ctx.metadata.insert("output_compressed".into(), json!(true));
    }
    serde_json::to_string_pretty(&result).context("serialize script result")
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::core_registry;
    use serde_json::json;

    #[test]
    fn test_run_script_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "alpha beta\n").unwrap();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute(
            "run_script",
            json!({"code": "const f = files.read('x.txt'); console.log('read it'); f.tokens"}),
        );
        assert!(!response.is_error, "{}", response.full_text());
        let result: serde_json::Value = serde_json::from_str(&response.full_text()).unwrap();
        assert!(result["value"].as_u64().unwrap() > 0);
        assert_eq!(result["console"][0], json!("read it"));
    }

    #[test]
    fn test_blocked_script_is_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("run_script", json!({"code": "eval('2+2')"}));
        assert!(response.is_error);
        assert!(response.full_text().contains("Blocked patterns"));
    }
}
