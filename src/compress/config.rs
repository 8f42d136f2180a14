/// Config compressor — depth-capped views of JSON and YAML-ish files.
///
/// JSON documents are recursively summarized: past the depth cap, arrays and
/// objects collapse to their cardinality; long arrays keep two samples; long
/// strings truncate. Indentation-based content (YAML, TOML-ish key trees)
/// is cut at a maximum indent width with nested-item markers.
use serde_json::Value;

use super::{CompressOptions, CompressedResult};
use crate::error::Result;

/// Arrays longer than this keep two samples plus a count marker.
const LARGE_ARRAY: usize = 4;
const MAX_STRING: usize = 100;

pub fn compress(content: &str, options: &CompressOptions) -> Result<CompressedResult> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let max_depth = options.level.pick([1usize, 2, 3]);
        let summarized = summarize_json(&value, 0, max_depth);
        let rendered = serde_json::to_string_pretty(&summarized)
            .unwrap_or_else(|_| summarized.to_string());
        return Ok(CompressedResult::build(content, rendered, "config-json", None));
    }
    let max_indent = options.level.pick([2usize, 4, 6]);
    let (rendered, hidden) = cap_indentation(content, max_indent);
    let omitted = (hidden > 0).then(|| format!("{hidden} nested lines omitted"));
    Ok(CompressedResult::build(content, rendered, "config-yaml", omitted))
}

fn summarize_json(value: &Value, depth: usize, max_depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if depth >= max_depth {
                return Value::String(format!("{{{} keys}}", map.len()));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), summarize_json(v, depth + 1, max_depth));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            if depth >= max_depth {
                return Value::String(format!("[{} items]", items.len()));
            }
            if items.len() > LARGE_ARRAY {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(2)
                    .map(|v| summarize_json(v, depth + 1, max_depth))
                    .collect();
                out.push(Value::String(format!("… ({} more items)", items.len() - 2)));
                Value::Array(out)
            } else {
                Value::Array(
                    items
                        .iter()
                        .map(|v| summarize_json(v, depth + 1, max_depth))
                        .collect(),
                )
            }
        }
        Value::String(s) if s.chars().count() > MAX_STRING => {
            let truncated: String = s.chars().take(MAX_STRING).collect();
            Value::String(format!("{truncated}..."))
        }
        other => other.clone(),
    }
}

/// Indent width: spaces count 1, tabs count 1 (width-preserving).
fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn cap_indentation(content: &str, max_indent: usize) -> (String, usize) {
    let mut out: Vec<String> = Vec::new();
    let mut hidden_run = 0usize;
    let mut hidden_total = 0usize;

    let flush = |run: &mut usize, out: &mut Vec<String>| {
        if *run > 0 {
            out.push(format!("{}… ({} nested items)", " ".repeat(max_indent), run));
            *run = 0;
        }
    };

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if indent_width(line) > max_indent {
            hidden_run += 1;
            hidden_total += 1;
        } else {
            flush(&mut hidden_run, &mut out);
            out.push(line.to_string());
        }
    }
    flush(&mut hidden_run, &mut out);
    (out.join("\n"), hidden_total)
}
