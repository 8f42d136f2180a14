/// Configuration — a TOML file resolving into the runtime config.
///
/// The file is optional; every field has a default, and unknown fields are
/// ignored so configs survive version skew. `CoreConfig` is the resolved
/// form handed to `Core::new`, with the working directory supplied by the
/// host process rather than the file.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::compress::DetailLevel;
use crate::sandbox::{SandboxBackend, SandboxConfig};

// ── File format ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub sandbox: SandboxSection,
    #[serde(default)]
    pub compression: CompressionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
    #[serde(default = "default_validate_file_hashes")]
    pub validate_file_hashes: bool,
}

fn default_max_entries() -> usize {
    100
}

fn default_max_memory_mb() -> usize {
    50
}

fn default_ttl_minutes() -> u64 {
    30
}

fn default_validate_file_hashes() -> bool {
    true
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_memory_mb: default_max_memory_mb(),
            ttl_minutes: default_ttl_minutes(),
            validate_file_hashes: default_validate_file_hashes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSection {
    /// "isolated" or "in-process"; the PARECTX_SANDBOX env var wins.
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_output_tokens() -> usize {
    2_000
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            backend: None,
            timeout_ms: default_timeout_ms(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionSection {
    #[serde(default = "default_level")]
    pub default_level: String,
}

fn default_level() -> String {
    "normal".to_string()
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self { default_level: default_level() }
    }
}

impl ConfigFile {
    /// Load from disk, or return defaults when the file doesn't exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a commented starter config (only if missing).
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }
}

// ── Resolved runtime config ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub working_dir: PathBuf,
    pub cache: CacheConfig,
    pub sandbox: SandboxConfig,
    pub default_level: DetailLevel,
}

impl CoreConfig {
    /// Defaults rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::resolve(&ConfigFile::default(), working_dir.into())
    }

    /// Merge the file with built-in defaults. Priority: env var > file >
    /// defaults (only the sandbox backend has an env toggle).
    pub fn resolve(file: &ConfigFile, working_dir: PathBuf) -> Self {
        let backend = match std::env::var("PARECTX_SANDBOX").as_deref() {
            Ok("in-process") => SandboxBackend::InProcess,
            Ok("isolated") => SandboxBackend::Isolated,
            _ => match file.sandbox.backend.as_deref() {
                Some("in-process") => SandboxBackend::InProcess,
                _ => SandboxBackend::Isolated,
            },
        };
        Self {
            working_dir,
            cache: CacheConfig {
                max_entries: file.cache.max_entries,
                max_memory_bytes: file.cache.max_memory_mb * 1024 * 1024,
                default_ttl_ms: file.cache.ttl_minutes * 60 * 1000,
                validate_file_hashes: file.cache.validate_file_hashes,
                ..CacheConfig::default()
            },
            sandbox: SandboxConfig {
                backend,
                timeout_ms: file.sandbox.timeout_ms,
                max_output_tokens: file.sandbox.max_output_tokens,
                ..SandboxConfig::default()
            },
            default_level: DetailLevel::from_str(&file.compression.default_level)
                .unwrap_or_default(),
        }
    }
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# parectx configuration

[cache]
max_entries          = 100
max_memory_mb        = 50
ttl_minutes          = 30
validate_file_hashes = true

[sandbox]
# backend = "isolated"     # or "in-process"; PARECTX_SANDBOX overrides
timeout_ms        = 5000
max_output_tokens = 2000

[compression]
default_level = "normal"   # minimal | normal | detailed
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(file.cache.max_entries, 100);
        assert_eq!(file.sandbox.timeout_ms, 5_000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parectx.toml");
        std::fs::write(&path, "[cache]\nmax_entries = 7\n").unwrap();
        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(file.cache.max_entries, 7);
        assert_eq!(file.cache.max_memory_mb, 50);
        assert_eq!(file.compression.default_level, "normal");
    }

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.cache.ttl_minutes, 30);
        assert_eq!(file.sandbox.max_output_tokens, 2_000);
    }

    #[test]
    fn test_resolve_converts_units() {
        let file = ConfigFile::default();
        let config = CoreConfig::resolve(&file, PathBuf::from("/tmp/w"));
        assert_eq!(config.cache.max_memory_bytes, 50 * 1024 * 1024);
        assert_eq!(config.cache.default_ttl_ms, 30 * 60 * 1000);
    }

    #[test]
    fn test_write_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("parectx.toml");
        ConfigFile::write_default_if_missing(&path).unwrap();
        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(file.cache.max_entries, 100);
    }
}
