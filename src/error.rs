/// Closed error taxonomy for the optimization core.
///
/// Library-layer APIs return `Result<T, CoreError>` and never panic across
/// their own boundary. Third-party errors are converted at the first layer
/// under our control. Every variant carries a human-readable message and a
/// stable machine discriminator (`code()`), which is what tool responses and
/// scripts see.
use std::path::Path;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // ── File family ───────────────────────────────────────────────────────
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read '{path}': {reason}")]
    FileRead { path: String, reason: String },

    #[error("path validation failed: {0}")]
    PathValidation(String),

    #[error("invalid glob pattern: {0}")]
    PatternInvalid(String),

    // ── Git family ────────────────────────────────────────────────────────
    #[error("not a git repository: {0}")]
    GitNotRepo(String),

    #[error("git {command} failed: {reason}")]
    GitCommandFailed { command: String, reason: String },

    #[error("git sub-command not allowed: {0}")]
    GitBlockedCommand(String),

    #[error("invalid git argument: {0}")]
    GitInvalidArg(String),

    // ── Parse family ──────────────────────────────────────────────────────
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    // ── Search family ─────────────────────────────────────────────────────
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("search failed: {0}")]
    SearchFailed(String),

    // ── Compress family ───────────────────────────────────────────────────
    #[error("compression failed: {0}")]
    CompressFailed(String),

    #[error("invalid ratio: {0}")]
    InvalidRatio(String),

    // ── Execution family ──────────────────────────────────────────────────
    #[error("execution timeout after {0}ms")]
    Timeout(u64),

    #[error("Blocked patterns: {0}")]
    BlockedCode(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("memory limit exceeded: {0}")]
    MemoryExceeded(String),
}

impl CoreError {
    /// Stable discriminator matching the wire-level error codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::PathValidation(_) => "PATH_VALIDATION_FAILED",
            Self::PatternInvalid(_) => "PATTERN_INVALID",
            Self::GitNotRepo(_) => "GIT_NOT_REPO",
            Self::GitCommandFailed { .. } => "GIT_COMMAND_FAILED",
            Self::GitBlockedCommand(_) => "GIT_BLOCKED_COMMAND",
            Self::GitInvalidArg(_) => "GIT_INVALID_ARG",
            Self::UnsupportedLanguage(_) => "UNSUPPORTED_LANGUAGE",
            Self::ParseFailed(_) => "PARSE_FAILED",
            Self::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            Self::InvalidRegex(_) => "INVALID_REGEX",
            Self::SearchFailed(_) => "SEARCH_FAILED",
            Self::CompressFailed(_) => "COMPRESS_FAILED",
            Self::InvalidRatio(_) => "INVALID_RATIO",
            Self::Timeout(_) => "TIMEOUT",
            Self::BlockedCode(_) => "BLOCKED_CODE",
            Self::ExecutionFailed(_) => "EXECUTION_FAILED",
            Self::MemoryExceeded(_) => "MEMORY_EXCEEDED",
        }
    }

    /// Map an io::Error from reading `path` into the taxonomy.
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path.to_string())
        } else {
            Self::FileRead {
                path: path.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl From<regex::Error> for CoreError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidRegex(err.to_string())
    }
}

/// Strip working-directory prefixes from a user-visible message so internal
/// layout never leaks into tool responses.
pub fn redact_paths(message: &str, working_dir: &Path) -> String {
    let prefix = working_dir.to_string_lossy();
    if prefix.is_empty() || prefix == "." {
        return message.to_string();
    }
    let mut out = message.replace(&format!("{prefix}/"), "");
    out = out.replace(prefix.as_ref(), ".");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(CoreError::FileNotFound("x".into()).code(), "FILE_NOT_FOUND");
        assert_eq!(CoreError::Timeout(100).code(), "TIMEOUT");
        assert_eq!(
            CoreError::BlockedCode("eval".into()).code(),
            "BLOCKED_CODE"
        );
    }

    #[test]
    fn test_from_io_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(CoreError::from_io("a.txt", &err).code(), "FILE_NOT_FOUND");
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert_eq!(CoreError::from_io("a.txt", &err).code(), "FILE_READ_ERROR");
    }

    #[test]
    fn test_redact_paths() {
        let wd = PathBuf::from("/home/user/project");
        let msg = "failed to read '/home/user/project/src/lib.rs'";
        assert_eq!(redact_paths(msg, &wd), "failed to read 'src/lib.rs'");
        // Bare prefix collapses to "."
        assert_eq!(redact_paths("/home/user/project", &wd), ".");
    }
}
