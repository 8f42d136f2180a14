/// Git integration behind a static allow-list.
///
/// The sandbox SDK exposes exactly five read-only sub-commands: diff, log,
/// blame, status, branch. Everything else is blocked before a process is
/// spawned, and arguments are screened so flags cannot smuggle writes or
/// pager/editor escapes in. Output goes back as plain stdout text.
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Sub-commands scripts may run.
const ALLOWED: &[&str] = &["diff", "log", "blame", "status", "branch"];

/// Flags accepted for the allowed sub-commands. Everything else that starts
/// with '-' is rejected.
const SAFE_FLAGS: &[&str] = &[
    "--stat",
    "--numstat",
    "--shortstat",
    "--name-only",
    "--name-status",
    "--cached",
    "--staged",
    "--oneline",
    "--graph",
    "--decorate",
    "--follow",
    "--short",
    "--porcelain",
    "--all",
    "--no-color",
    "--date=iso",
    "--date=relative",
    "-p",
    "-s",
    "-a",
];

#[derive(Debug)]
pub struct GitContext {
    /// Absolute path to the repository root.
    root: PathBuf,
}

impl GitContext {
    /// Open the repository containing `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let output = std::process::Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .map_err(|e| CoreError::GitCommandFailed {
                command: "rev-parse".into(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(CoreError::GitNotRepo(dir.display().to_string()));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self { root: PathBuf::from(root) })
    }

    /// Run an allow-listed sub-command with screened arguments.
    pub fn run(&self, subcommand: &str, args: &[String]) -> Result<String> {
        if !ALLOWED.contains(&subcommand) {
            return Err(CoreError::GitBlockedCommand(subcommand.to_string()));
        }
        for arg in args {
            validate_arg(arg)?;
        }
        self.run_git(subcommand, args)
    }

    /// Run git in the repo root. Stdout on success, taxonomy error with
    /// stderr otherwise.
    fn run_git(&self, subcommand: &str, args: &[String]) -> Result<String> {
        let output = std::process::Command::new("git")
            .arg(subcommand)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| CoreError::GitCommandFailed {
                command: subcommand.to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(CoreError::GitCommandFailed {
                command: subcommand.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn validate_arg(arg: &str) -> Result<()> {
    if arg.contains(['\n', '\0', ';', '|', '&', '`', '$']) {
        return Err(CoreError::GitInvalidArg(arg.to_string()));
    }
    if arg.starts_with('-') && !SAFE_FLAGS.contains(&arg) {
        // Limited count flags like -5 / -n20 are fine for log.
        let numeric = arg[1..].trim_start_matches('n');
        if numeric.is_empty() || !numeric.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::GitInvalidArg(arg.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let ok = std::process::Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap()
                .status
                .success();
            assert!(ok, "git {args:?} failed");
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "t@example.com"]);
        run(&["config", "user.name", "t"]);
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "init"]);
        dir
    }

    #[test]
    fn test_open_non_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitContext::open(dir.path()).unwrap_err();
        assert_eq!(err.code(), "GIT_NOT_REPO");
    }

    #[test]
    fn test_status_and_log_run() {
        let dir = init_repo();
        let git = GitContext::open(dir.path()).unwrap();
        let status = git.run("status", &["--short".into()]).unwrap();
        assert!(status.is_empty());
        let log = git.run("log", &["--oneline".into()]).unwrap();
        assert!(log.contains("init"));
    }

    #[test]
    fn test_blocked_subcommand() {
        let dir = init_repo();
        let git = GitContext::open(dir.path()).unwrap();
        for cmd in ["push", "commit", "reset", "checkout", "clean"] {
            let err = git.run(cmd, &[]).unwrap_err();
            assert_eq!(err.code(), "GIT_BLOCKED_COMMAND", "{cmd} must be blocked");
        }
    }

    #[test]
    fn test_dangerous_args_rejected() {
        let dir = init_repo();
        let git = GitContext::open(dir.path()).unwrap();
        for arg in ["--output=/tmp/x", "-o", "a;b", "$(rm -rf .)", "--ext-diff"] {
            let err = git.run("diff", &[arg.to_string()]).unwrap_err();
            assert_eq!(err.code(), "GIT_INVALID_ARG", "{arg} must be rejected");
        }
        // Count limits stay usable.
        assert!(git.run("log", &["-1".into(), "--oneline".into()]).is_ok());
    }
}
