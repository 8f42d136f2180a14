/// Tool registry — named operations with schemas, annotations and metered
/// execution.
///
/// `execute` is total: unknown tools, handler failures and middleware
/// filtering all come back as responses, never as panics or raised errors.
/// Token accounting (in from the serialized arguments, out from the response
/// text) feeds the session tracker on every path.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::redact_paths;
use crate::middleware::{BeforeAction, Middleware, MiddlewareChain, ToolContext};
use crate::session::SessionTracker;
use crate::tokens::{count_json_tokens, count_tokens};

// ── Response model ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecMeta {
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub duration_ms: u64,
    pub was_filtered: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub middleware_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
    pub meta: ExecMeta,
}

impl ToolResponse {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock { block_type: "text".into(), text: s.into() }],
            is_error: false,
            meta: ExecMeta::default(),
        }
    }

    pub fn error(s: &str) -> Self {
        Self {
            content: vec![ContentBlock { block_type: "text".into(), text: s.to_string() }],
            is_error: true,
            meta: ExecMeta::default(),
        }
    }

    fn filtered(tool: &str) -> Self {
        let mut r = Self::text(format!("[invocation of '{tool}' filtered by middleware]"));
        r.meta.was_filtered = true;
        r
    }

    /// Concatenated text of every block — the unit `tokens_out` is counted
    /// over.
    pub fn full_text(&self) -> String {
        self.content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Definitions ───────────────────────────────────────────────────────────────

/// Metadata only; hints never change execution.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_running_hint: Option<bool>,
}

pub type ToolHandler = Arc<dyn Fn(&mut ToolContext, &Value) -> anyhow::Result<String> + Send + Sync>;

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub annotations: ToolAnnotations,
    pub handler: ToolHandler,
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    chain: MiddlewareChain,
    session: Arc<SessionTracker>,
    working_dir: PathBuf,
}

impl ToolRegistry {
    pub fn new(working_dir: PathBuf, session: Arc<SessionTracker>) -> Self {
        Self {
            tools: HashMap::new(),
            chain: MiddlewareChain::new(),
            session,
            working_dir,
        }
    }

    pub fn register(&mut self, definition: ToolDefinition) {
        tracing::debug!(tool = %definition.name, "tool registered");
        self.tools.insert(definition.name.clone(), definition);
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.chain.add(middleware);
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The serialized tool listing, as a client would receive it. Kept under
    /// a hard token budget (see the tools module tests).
    pub fn list_tools(&self) -> Value {
        let mut listing: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                let mut v = json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                });
                if let Some(out) = &t.output_schema {
                    v["outputSchema"] = out.clone();
                }
                if serde_json::to_value(&t.annotations)
                    .map(|a| a != json!({}))
                    .unwrap_or(false)
                {
                    v["annotations"] = json!(t.annotations);
                }
                v
            })
            .collect();
        listing.sort_by(|a, b| {
            a["name"].as_str().unwrap_or("").cmp(b["name"].as_str().unwrap_or(""))
        });
        json!(listing)
    }

    /// Run one tool invocation end to end: middleware before, handler,
    /// middleware after, session accounting. Total — never raises.
    pub fn execute(&self, name: &str, arguments: Value) -> ToolResponse {
        let Some(tool) = self.tools.get(name) else {
            return ToolResponse::error(&format!("Unknown tool: '{name}'"));
        };

        let tokens_in = count_json_tokens(&arguments);
        let mut ctx = ToolContext::new(name, arguments);

        if self.chain.run_before(&mut ctx) == BeforeAction::Filter {
            let mut response = ToolResponse::filtered(name);
            response.meta.tokens_in = tokens_in;
            response.meta.duration_ms = ctx.start_time.elapsed().as_millis() as u64;
            response.meta.middleware_errors = ctx.middleware_errors.clone();
            self.session.record(name, tokens_in, 0, 0, response.meta.duration_ms, false);
            return response;
        }

        let args = ctx.arguments.clone();
        let outcome = (tool.handler)(&mut ctx, &args);

        let mut response = match outcome {
            Ok(text) => {
                let mut r = ToolResponse::text(text);
                r.meta.tokens_out = count_tokens(&r.full_text());
                self.chain.run_after(&mut ctx, r)
            }
            Err(err) => match self.chain.run_error(&mut ctx, &err) {
                Some(recovered) => recovered,
                None => {
                    let message = redact_paths(&format!("{err:#}"), &self.working_dir);
                    ToolResponse::error(&message)
                }
            },
        };

        response.meta.tokens_in = tokens_in;
        response.meta.tokens_out = count_tokens(&response.full_text());
        response.meta.duration_ms = ctx.start_time.elapsed().as_millis() as u64;
        response.meta.middleware_errors = ctx.middleware_errors.clone();

        let tokens_saved = ctx
            .metadata
            .get("tokens_saved")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        self.session.record(
            name,
            tokens_in,
            response.meta.tokens_out,
            tokens_saved,
            response.meta.duration_ms,
            response.is_error,
        );
        response
    }
}
