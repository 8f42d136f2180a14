/// parectx — context optimization core for LLM coding assistants.
///
/// Parsers, compressors, summarizers, a smart cache and a sandboxed script
/// runtime, wired together behind a tool registry. The MCP transport, CLI
/// and any UI live outside this crate; hosts construct one `Core`, register
/// it with their transport, and route tool calls through `Core::execute`.
pub mod build_output;
pub mod cache;
pub mod compress;
pub mod config;
pub mod detect;
pub mod error;
pub mod git;
pub mod middleware;
pub mod parsers;
pub mod registry;
pub mod sandbox;
pub mod session;
pub mod structure;
pub mod summarize;
pub mod tokens;
pub mod tools;

use std::sync::Arc;

use serde_json::Value;

pub use cache::{CacheConfig, SmartCache};
pub use compress::{CompressOptions, CompressedResult, DetailLevel};
pub use config::{ConfigFile, CoreConfig};
pub use detect::ContentType;
pub use error::{CoreError, Result};
pub use parsers::Language;
pub use registry::{ToolRegistry, ToolResponse};
pub use sandbox::{SandboxBackend, SandboxConfig, ScriptRuntime, SdkBridge};
pub use session::SessionTracker;
pub use structure::{CodeElement, ElementKind, FileStructure};

/// The assembled pipeline. Constructed once at startup, passed explicitly
/// to whatever serves it, torn down by drop. There is no hidden module
/// state: the cache, session tracker and registry all live here.
pub struct Core {
    config: CoreConfig,
    cache: Arc<SmartCache<Value>>,
    session: Arc<SessionTracker>,
    registry: ToolRegistry,
}

impl Core {
    pub fn new(config: CoreConfig) -> Result<Self> {
        let session = Arc::new(SessionTracker::new());
        let cache = Arc::new(SmartCache::new(config.cache.clone()));

        let bridge = Arc::new(SdkBridge::new(
            config.working_dir.clone(),
            Arc::clone(&cache),
            Arc::clone(&session),
        ));
        let deps = Arc::new(tools::ToolDeps {
            bridge: Arc::clone(&bridge),
            runtime: ScriptRuntime::new(config.sandbox.clone(), bridge),
        });

        let mut registry = ToolRegistry::new(config.working_dir.clone(), Arc::clone(&session));
        registry.add_middleware(Arc::new(middleware::TracingMiddleware));
        tools::register_all(&mut registry, deps);

        tracing::debug!(
            working_dir = %config.working_dir.display(),
            tools = registry.tool_names().len(),
            "core initialized"
        );
        Ok(Self { config, cache, session, registry })
    }

    /// Convenience constructor rooted at a working directory with defaults.
    pub fn with_working_dir(working_dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::new(CoreConfig::new(working_dir))
    }

    pub fn execute(&self, tool: &str, arguments: Value) -> ToolResponse {
        self.registry.execute(tool, arguments)
    }

    pub fn list_tools(&self) -> Value {
        self.registry.list_tools()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionTracker> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<SmartCache<Value>> {
        &self.cache
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}
