/// Sandboxed script runtime.
///
/// Scripts are ECMAScript, executed by an embedded interpreter with no host
/// filesystem, no network and no process access — the only door is the
/// `__host` bridge wired to the SDK. Two backends share the same prelude and
/// pre-scan: `Isolated` (default) runs each script on a dedicated worker
/// thread with interpreter limits and a wall-clock timeout whose expiry
/// tears the runtime down; `InProcess` evaluates on the caller's thread with
/// the interpreter limits only.
pub mod paths;
pub mod pipeline;
pub mod sdk;

use std::cell::RefCell;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use boa_engine::{js_string, Context, JsArgs, JsString, JsValue, NativeFunction, Source};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::compress::{generic, CompressOptions, DetailLevel};
use crate::error::{CoreError, Result};
use crate::tokens::count_tokens;

pub use pipeline::{Pipeline, PipelineOutput, PipelineStats};
pub use sdk::SdkBridge;

const PRELUDE: &str = include_str!("prelude.js");

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackend {
    Isolated,
    InProcess,
}

impl SandboxBackend {
    /// `PARECTX_SANDBOX=in-process` opts out of the worker-thread backend.
    pub fn from_env() -> Self {
        match std::env::var("PARECTX_SANDBOX").as_deref() {
            Ok("in-process") => Self::InProcess,
            _ => Self::Isolated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    pub timeout_ms: u64,
    /// Interpreter loop-iteration budget; the memory cap is approximated by
    /// the recursion and stack limits.
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub max_output_tokens: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::from_env(),
            timeout_ms: 5_000,
            loop_iteration_limit: 5_000_000,
            recursion_limit: 512,
            max_output_tokens: 2_000,
        }
    }
}

// ── Result model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScriptResult {
    pub value: Value,
    pub console: Vec<String>,
    pub duration_ms: u64,
    pub output_tokens: usize,
    /// Set when the output budget forced a generic-compression pass.
    pub compressed: bool,
}

// ── Static pre-scan ───────────────────────────────────────────────────────────

static BLOCKED: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("eval", Regex::new(r"\beval\b").unwrap()),
        ("require", Regex::new(r"\brequire\b").unwrap()),
        ("child_process", Regex::new(r"child_process").unwrap()),
        ("fs.", Regex::new(r"\bfs\.").unwrap()),
        ("process.exit", Regex::new(r"process\.exit").unwrap()),
        ("Function(", Regex::new(r"\bFunction\s*\(").unwrap()),
    ]
});

/// Reject code containing any blocked pattern before compilation.
pub fn scan_blocked(code: &str) -> Result<()> {
    let matched: Vec<&str> = BLOCKED
        .iter()
        .filter(|(_, re)| re.is_match(code))
        .map(|(name, _)| *name)
        .collect();
    if matched.is_empty() {
        Ok(())
    } else {
        Err(CoreError::BlockedCode(matched.join(", ")))
    }
}

// ── Host bridge plumbing ──────────────────────────────────────────────────────

thread_local! {
    static ACTIVE_BRIDGE: RefCell<Option<Arc<SdkBridge>>> = const { RefCell::new(None) };
}

/// Scoped bridge installation: released on every exit path.
struct BridgeGuard;

impl BridgeGuard {
    fn install(bridge: Arc<SdkBridge>) -> Self {
        ACTIVE_BRIDGE.with(|slot| *slot.borrow_mut() = Some(bridge));
        Self
    }
}

impl Drop for BridgeGuard {
    fn drop(&mut self) {
        ACTIVE_BRIDGE.with(|slot| *slot.borrow_mut() = None);
    }
}

fn host_call(
    _this: &JsValue,
    args: &[JsValue],
    context: &mut Context,
) -> boa_engine::JsResult<JsValue> {
    let op = args
        .get_or_undefined(0)
        .to_string(context)?
        .to_std_string_escaped();
    let payload = args
        .get_or_undefined(1)
        .to_string(context)?
        .to_std_string_escaped();
    let response = ACTIVE_BRIDGE.with(|slot| match slot.borrow().as_ref() {
        Some(bridge) => bridge.dispatch_json(&op, &payload),
        None => r#"{"ok":false,"error":"no host bridge installed","code":"EXECUTION_FAILED"}"#
            .to_string(),
    });
    Ok(JsValue::from(JsString::from(response)))
}

// ── Runtime ───────────────────────────────────────────────────────────────────

pub struct ScriptRuntime {
    config: SandboxConfig,
    bridge: Arc<SdkBridge>,
}

struct RawRun {
    value: Value,
    console: Vec<String>,
}

impl ScriptRuntime {
    pub fn new(config: SandboxConfig, bridge: Arc<SdkBridge>) -> Self {
        Self { config, bridge }
    }

    /// Run a script to completion or failure. Total over the taxonomy:
    /// blocked code, timeout, interpreter and bridge errors all come back as
    /// `CoreError`s.
    pub fn execute(&self, code: &str) -> Result<ScriptResult> {
        scan_blocked(code)?;
        let started = Instant::now();
        let raw = match self.config.backend {
            SandboxBackend::Isolated => self.run_isolated(code)?,
            SandboxBackend::InProcess => {
                run_in_interpreter(code, Arc::clone(&self.bridge), &self.config)?
            }
        };
        Ok(self.budget_output(raw, started))
    }

    fn run_isolated(&self, code: &str) -> Result<RawRun> {
        let (tx, rx) = mpsc::channel();
        let code = code.to_string();
        let bridge = Arc::clone(&self.bridge);
        let config = self.config.clone();

        let handle = std::thread::Builder::new()
            .name("parectx-sandbox".into())
            .spawn(move || {
                let outcome = run_in_interpreter(&code, bridge, &config);
                let _ = tx.send(outcome);
            })
            .map_err(|e| CoreError::ExecutionFailed(format!("sandbox thread: {e}")))?;

        match rx.recv_timeout(Duration::from_millis(self.config.timeout_ms)) {
            Ok(outcome) => {
                let _ = handle.join();
                outcome
            }
            Err(_) => {
                // The worker is abandoned; the interpreter's loop budget
                // bounds how long it can keep running.
                tracing::warn!(timeout_ms = self.config.timeout_ms, "sandbox execution timed out");
                drop(handle);
                Err(CoreError::Timeout(self.config.timeout_ms))
            }
        }
    }

    /// JSON-serialize the result and auto-compress past the output budget.
    fn budget_output(&self, raw: RawRun, started: Instant) -> ScriptResult {
        let serialized = raw.value.to_string();
        let tokens = count_tokens(&serialized);
        let (value, output_tokens, compressed) = if tokens > self.config.max_output_tokens {
            let squeezed = generic::compress(
                &serde_json::to_string_pretty(&raw.value).unwrap_or(serialized),
                &CompressOptions::with_level(DetailLevel::Minimal),
            )
            .map(|r| r.compressed)
            .unwrap_or_else(|_| raw.value.to_string());
            let n = count_tokens(&squeezed);
            (Value::String(squeezed), n, true)
        } else {
            (raw.value, tokens, false)
        };
        ScriptResult {
            value,
            console: raw.console,
            duration_ms: started.elapsed().as_millis() as u64,
            output_tokens,
            compressed,
        }
    }
}

/// One fresh interpreter per run: limits, bridge, prelude, user code,
/// result extraction. Runs on whichever thread calls it.
fn run_in_interpreter(
    code: &str,
    bridge: Arc<SdkBridge>,
    config: &SandboxConfig,
) -> Result<RawRun> {
    let _guard = BridgeGuard::install(bridge);

    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(config.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(config.recursion_limit);

    context
        .register_global_callable(js_string!("__host"), 2, NativeFunction::from_fn_ptr(host_call))
        .map_err(|e| CoreError::ExecutionFailed(e.to_string()))?;

    context
        .eval(Source::from_bytes(PRELUDE))
        .map_err(|e| CoreError::ExecutionFailed(format!("prelude: {e}")))?;

    let completion = context
        .eval(Source::from_bytes(code))
        .map_err(|e| flatten_js_error(&e.to_string(), config))?;

    let global = context.global_object();
    global
        .set(js_string!("__result"), completion, false, &mut context)
        .map_err(|e| CoreError::ExecutionFailed(e.to_string()))?;

    let packed = context
        .eval(Source::from_bytes("__finish()"))
        .map_err(|e| CoreError::ExecutionFailed(e.to_string()))?;
    let packed = packed
        .to_string(&mut context)
        .map_err(|e| CoreError::ExecutionFailed(e.to_string()))?
        .to_std_string_escaped();

    let parsed: Value = serde_json::from_str(&packed)
        .map_err(|e| CoreError::ExecutionFailed(format!("result serialization: {e}")))?;
    let console = parsed["console"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(RawRun { value: parsed["value"].clone(), console })
}

/// Interpreter failures flatten into the taxonomy with the original message
/// preserved; limit trips map to their closest kind.
fn flatten_js_error(message: &str, config: &SandboxConfig) -> CoreError {
    let lower = message.to_lowercase();
    if lower.contains("loop iteration") {
        return CoreError::Timeout(config.timeout_ms);
    }
    if lower.contains("recursion") || lower.contains("stack") {
        return CoreError::MemoryExceeded(message.to_string());
    }
    CoreError::ExecutionFailed(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, SmartCache};
    use crate::session::SessionTracker;

    fn runtime(config: SandboxConfig) -> (tempfile::TempDir, ScriptRuntime) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "alpha\nbeta\ngamma\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "def run():\n    pass\n").unwrap();
        let bridge = Arc::new(SdkBridge::new(
            dir.path().to_path_buf(),
            Arc::new(SmartCache::new(CacheConfig::default())),
            Arc::new(SessionTracker::new()),
        ));
        (dir, ScriptRuntime::new(config, bridge))
    }

    fn isolated() -> SandboxConfig {
        SandboxConfig {
            backend: SandboxBackend::Isolated,
            timeout_ms: 2_000,
            loop_iteration_limit: 200_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_script_returns_value_and_console() {
        let (_dir, rt) = runtime(isolated());
        let result = rt
            .execute("console.log('starting'); const n = utils.countTokens('hello world'); n * 2")
            .unwrap();
        assert!(result.value.as_u64().unwrap() >= 2);
        assert_eq!(result.console, vec!["starting"]);
        assert!(!result.compressed);
    }

    #[test]
    fn test_files_namespace_through_script() {
        let (_dir, rt) = runtime(isolated());
        let result = rt
            .execute("const f = files.read('data.txt'); f.lines")
            .unwrap();
        assert_eq!(result.value, serde_json::json!(3));
    }

    #[test]
    fn test_blocked_patterns_rejected_before_run() {
        let (_dir, rt) = runtime(isolated());
        for code in [
            "eval('1+1')",
            "require('fs')",
            "const cp = child_process",
            "fs.readFileSync('/etc/passwd')",
            "process.exit(1)",
            "new Function('return 1')()",
        ] {
            let err = rt.execute(code).unwrap_err();
            assert_eq!(err.code(), "BLOCKED_CODE", "{code} must be blocked");
            assert!(err.to_string().starts_with("Blocked patterns:"));
        }
    }

    #[test]
    fn test_busy_loop_times_out_quickly() {
        let (_dir, rt) = runtime(SandboxConfig {
            backend: SandboxBackend::Isolated,
            timeout_ms: 100,
            loop_iteration_limit: u64::MAX,
            ..Default::default()
        });
        let started = Instant::now();
        let err = rt.execute("let x = 0; while (true) { x += 1; } x").unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn test_repeated_runs_do_not_leak() {
        let (_dir, rt) = runtime(SandboxConfig {
            backend: SandboxBackend::Isolated,
            timeout_ms: 20,
            loop_iteration_limit: 50_000,
            ..Default::default()
        });
        for _ in 0..100 {
            let _ = rt.execute("let x = 0; while (true) { x += 1; } x");
        }
        // And the runtime still works afterwards.
        let ok = rt.execute("1 + 1").unwrap();
        assert_eq!(ok.value, serde_json::json!(2));
    }

    #[test]
    fn test_in_process_backend_loop_budget() {
        let (_dir, rt) = runtime(SandboxConfig {
            backend: SandboxBackend::InProcess,
            loop_iteration_limit: 10_000,
            ..Default::default()
        });
        let err = rt.execute("let x = 0; while (true) { x += 1; } x").unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn test_script_errors_flatten_with_message() {
        let (_dir, rt) = runtime(isolated());
        let err = rt.execute("throw new Error('custom failure')").unwrap_err();
        assert_eq!(err.code(), "EXECUTION_FAILED");
        assert!(err.to_string().contains("custom failure"));
    }

    #[test]
    fn test_output_budget_compresses() {
        let (_dir, rt) = runtime(SandboxConfig {
            backend: SandboxBackend::Isolated,
            max_output_tokens: 20,
            ..isolated()
        });
        let result = rt
            .execute("const xs = []; for (let i = 0; i < 200; i++) xs.push('row ' + i); xs")
            .unwrap();
        assert!(result.compressed);
        assert!(result.output_tokens < 200);
    }

    #[test]
    fn test_pipeline_in_script() {
        let (_dir, rt) = runtime(isolated());
        let result = rt
            .execute(
                "const out = pipe.glob('*.py').read().parse().build(); \
                 out.ok ? out.value[0].functions[0].name : out.error",
            )
            .unwrap();
        assert_eq!(result.value, serde_json::json!("run"));
    }

    #[test]
    fn test_pipeline_recover_in_script() {
        let (_dir, rt) = runtime(isolated());
        let result = rt
            .execute(
                "const out = pipe.fromData(['missing.txt']).map(p => files.read(p)).recover(['ok']).build(); \
                 [out.ok, out.value[0], out.stats.errors.length]",
            )
            .unwrap();
        assert_eq!(result.value, serde_json::json!([true, "ok", 1]));
    }
}
