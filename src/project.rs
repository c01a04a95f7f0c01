//! Project root detection.
//!
//! An observation's project is the git toplevel of the directory it was
//! captured in, or that directory itself outside a repository.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

/// Upper bound on any git invocation.
const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Project root for the current working directory.
pub async fn detect_project_path() -> Option<String> {
    let cwd = std::env::current_dir().ok()?;
    detect_project_path_from(&cwd).await
}

/// Project root for `dir`: the enclosing git toplevel if there is one,
/// otherwise the canonical form of `dir`.
pub async fn detect_project_path_from(dir: &Path) -> Option<String> {
    let root = match git_toplevel(dir).await {
        Some(root) => root,
        None => dir.canonicalize().ok()?,
    };
    Some(root.to_string_lossy().into_owned())
}

async fn git_toplevel(dir: &Path) -> Option<PathBuf> {
    let mut command = Command::new("git");
    command
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--show-toplevel"]);
    let stdout = run_with_timeout(command, GIT_TIMEOUT).await?;
    let trimmed = stdout.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// Stdout of a successful run. The child is killed if it outlives `timeout`.
async fn run_with_timeout(mut command: Command, timeout: Duration) -> Option<String> {
    command.kill_on_drop(true);
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => output.ok()?,
        Err(_) => {
            tracing::debug!(?timeout, "git did not answer, ignoring");
            return None;
        }
    };
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Display label for a project path: its last component.
pub fn project_name(project_path: &str) -> String {
    let trimmed = project_path.trim_end_matches(['/', '\\']);
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_path.to_string())
}
