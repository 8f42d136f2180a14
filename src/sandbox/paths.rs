/// Path validation for everything the sandbox can touch.
///
/// A path is safe iff, after resolution, it stays inside the working
/// directory. Absolute paths, `..` segments and `~` expansion are rejected
/// before any filesystem call; symlinked escapes are caught by
/// canonicalization when the target exists.
use std::path::{Component, Path, PathBuf};

use crate::error::{CoreError, Result};

/// Resolve `path` (relative to `working_dir`) or explain why it is unsafe.
pub fn validate_path(path: &str, working_dir: &Path) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(CoreError::PathValidation("empty path".into()));
    }
    if path.starts_with('~') {
        return Err(CoreError::PathValidation(format!(
            "home expansion not allowed: {path}"
        )));
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return Err(CoreError::PathValidation(format!(
            "absolute paths not allowed: {path}"
        )));
    }
    for component in candidate.components() {
        if matches!(component, Component::ParentDir) {
            return Err(CoreError::PathValidation(format!(
                "parent traversal not allowed: {path}"
            )));
        }
    }

    let joined = working_dir.join(candidate);

    // When the file exists, canonicalize both sides so symlinks cannot step
    // outside the root.
    if let (Ok(resolved), Ok(root)) = (joined.canonicalize(), working_dir.canonicalize()) {
        if !resolved.starts_with(&root) {
            return Err(CoreError::PathValidation(format!(
                "path escapes working directory: {path}"
            )));
        }
        return Ok(resolved);
    }
    Ok(joined)
}

/// Glob patterns get the same treatment minus filesystem resolution.
pub fn validate_glob(pattern: &str) -> Result<()> {
    if pattern.starts_with('/') || pattern.starts_with('\\') {
        return Err(CoreError::PatternInvalid(format!(
            "absolute glob not allowed: {pattern}"
        )));
    }
    if pattern.starts_with('~') {
        return Err(CoreError::PatternInvalid(format!(
            "home expansion not allowed: {pattern}"
        )));
    }
    if pattern.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(CoreError::PatternInvalid(format!(
            "parent traversal not allowed: {pattern}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_inside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let resolved = validate_path("a.txt", dir.path()).unwrap();
        assert!(resolved.ends_with("a.txt"));
    }

    #[test]
    fn test_absolute_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_path("/etc/passwd", dir.path()).unwrap_err();
        assert_eq!(err.code(), "PATH_VALIDATION_FAILED");
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for p in ["../x", "a/../../x", "a/b/../../../etc"] {
            let err = validate_path(p, dir.path()).unwrap_err();
            assert_eq!(err.code(), "PATH_VALIDATION_FAILED", "should reject {p}");
        }
    }

    #[test]
    fn test_home_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_path("~/notes.txt", dir.path()).is_err());
    }

    #[test]
    fn test_symlink_escape_rejected() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "hidden").unwrap();
        std::os::unix::fs::symlink(&secret, root.path().join("link.txt")).unwrap();
        let err = validate_path("link.txt", root.path()).unwrap_err();
        assert_eq!(err.code(), "PATH_VALIDATION_FAILED");
    }

    #[test]
    fn test_glob_rules() {
        assert!(validate_glob("src/**/*.rs").is_ok());
        assert!(validate_glob("/abs/**").is_err());
        assert!(validate_glob("../up/**").is_err());
        assert!(validate_glob("~/home/**").is_err());
        assert!(validate_glob("a/../b/*.ts").is_err());
    }
}
