/// Code structure tools: parse, extract, skeleton, symbol search.
use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::ToolDeps;
use crate::middleware::ToolContext;

pub fn parse_definition() -> Value {
    json!({
        "name": "parse_code",
        "description": "Parse a source file (or inline content) into its structure: imports, functions, classes, types, with line ranges and signatures.",
        "parameters": {
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Source file, relative to the working dir" },
                "content": { "type": "string", "description": "Inline source instead of a path" },
                "language": { "type": "string", "description": "typescript|tsx|javascript|python|go|rust|php|swift" }
            }
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute_parse(deps: &ToolDeps, _ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let structure = deps.bridge.dispatch("code.parse", args).context("parse_code")?;
    serde_json::to_string_pretty(&structure).context("serialize structure")
}

pub fn extract_definition() -> Value {
    json!({
        "name": "extract_code",
        "description": "Extract one named element (function, class, ...) from a source file, optionally with the file's imports.",
        "parameters": {
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" },
                "name": { "type": "string", "description": "Element name to extract" },
                "type": { "type": "string", "description": "Element kind filter, e.g. function, class, method" },
                "include_imports": { "type": "boolean" }
            },
            "required": ["name"]
        },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_extract(deps: &ToolDeps, _ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let extracted = deps.bridge.dispatch("code.extract", args).context("extract_code")?;
    let element = &extracted["element"];
    let mut out = format!(
        "[{} {} (lines {}-{})]\n",
        element["kind"].as_str().unwrap_or("element"),
        element["name"].as_str().unwrap_or("?"),
        element["start_line"],
        element["end_line"],
    );
    if let Some(imports) = extracted["imports"].as_str() {
        out.push_str(imports);
        out.push_str("\n\n");
    }
    out.push_str(extracted["content"].as_str().unwrap_or_default());
    Ok(out)
}

pub fn skeleton_definition() -> Value {
    json!({
        "name": "code_skeleton",
        "description": "Signature outline of a source file: imports and declaration heads, no bodies.",
        "parameters": {
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" },
                "language": { "type": "string" }
            }
        },
        "annotations": { "readOnlyHint": true, "idempotentHint": true }
    })
}

pub fn execute_skeleton(deps: &ToolDeps, ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let skeleton = deps.bridge.dispatch("code.skeleton", args).context("code_skeleton")?;
    let skeleton = skeleton.as_str().unwrap_or_default().to_string();
    // A skeleton is itself a compression of the source; account for it when
    // the source is available.
    if let Ok(read) = deps.bridge.dispatch("files.read", args) {
        let content = read["content"].as_str().unwrap_or_default();
        super::note_savings(
            ctx,
            crate::tokens::count_tokens(content),
            crate::tokens::count_tokens(&skeleton),
        );
    }
    Ok(skeleton)
}

pub fn search_definition() -> Value {
    json!({
        "name": "search_code",
        "description": "Find named elements across the project by substring, with file and line locations.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Name substring, case-insensitive" },
                "glob": { "type": "string", "description": "File filter, default all source files" }
            },
            "required": ["query"]
        },
        "annotations": { "readOnlyHint": true }
    })
}

pub fn execute_search(deps: &ToolDeps, _ctx: &mut ToolContext, args: &Value) -> Result<String> {
    let hits = deps.bridge.dispatch("search.symbols", args).context("search_code")?;
    let hits = hits.as_array().cloned().unwrap_or_default();
    if hits.is_empty() {
        return Ok(format!(
            "No symbols matching '{}'.",
            args["query"].as_str().unwrap_or("")
        ));
    }
    let mut out = format!("[{} symbols matched]\n", hits.len());
    for hit in &hits {
        out.push_str(&format!(
            "{}:{} {} {}\n",
            hit["file"].as_str().unwrap_or("?"),
            hit["line"],
            hit["kind"].as_str().unwrap_or("?"),
            hit["name"].as_str().unwrap_or("?"),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::core_registry;
    use serde_json::json;

    fn scratch() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("svc.ts"),
            "import { db } from './db';\n\nexport async function loadUser(id: string): Promise<User> {\n    return db.find(id);\n}\n\nfunction helper() {}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_code_tool() {
        let dir = scratch();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("parse_code", json!({"path": "svc.ts"}));
        assert!(!response.is_error);
        let parsed: serde_json::Value = serde_json::from_str(&response.full_text()).unwrap();
        assert_eq!(parsed["language"], json!("typescript"));
        assert_eq!(parsed["functions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_extract_code_tool() {
        let dir = scratch();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute(
            "extract_code",
            json!({"path": "svc.ts", "name": "loadUser", "include_imports": true}),
        );
        assert!(!response.is_error);
        let text = response.full_text();
        assert!(text.contains("loadUser"));
        assert!(text.contains("import { db }"));
        assert!(!text.contains("helper"));
    }

    #[test]
    fn test_skeleton_tool_exact_head() {
        let dir = scratch();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("code_skeleton", json!({"path": "svc.ts"}));
        assert!(!response.is_error);
        let text = response.full_text();
        assert!(text.contains(
            "export async function loadUser(id: string): Promise<User>"
        ));
        assert!(!text.contains("db.find"));
    }

    #[test]
    fn test_search_code_tool() {
        let dir = scratch();
        let (registry, _) = core_registry(dir.path());
        let response = registry.execute("search_code", json!({"query": "load"}));
        assert!(!response.is_error);
        assert!(response.full_text().contains("svc.ts:"));
        let response = registry.execute("search_code", json!({"query": "zzz"}));
        assert!(response.full_text().contains("No symbols"));
    }
}
