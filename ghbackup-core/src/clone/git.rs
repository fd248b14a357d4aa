//! Clone capability backed by the git executable

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::Cloner;
use crate::config::CloneConfig;
use crate::{Error, Result};

/// Runs `git clone <url> <dest>` as a child process
#[derive(Debug, Clone)]
pub struct GitCloner {
    git_path: String,
    quiet: bool,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::new(&CloneConfig::default())
    }
}

impl GitCloner {
    /// Create a cloner from clone configuration
    pub fn new(config: &CloneConfig) -> Self {
        Self {
            git_path: config.git_path.clone(),
            quiet: config.quiet,
        }
    }

    /// The git executable this cloner runs
    pub fn git_path(&self) -> &str {
        &self.git_path
    }
}

#[async_trait]
impl Cloner for GitCloner {
    async fn clone_repo(&self, clone_url: &str, dest: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.git_path);
        cmd.arg("clone");
        if self.quiet {
            cmd.arg("--quiet");
        }
        cmd.arg(clone_url)
            .arg(dest)
            // Never block a worker on an interactive credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(git = %self.git_path, url = %clone_url, dest = %dest.display(), "Running git clone");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::clone_failed(
                    clone_url,
                    format!("git executable not found at '{}'", self.git_path),
                )
            } else {
                Error::clone_failed(clone_url, format!("failed to run git clone: {}", e))
            }
        })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::clone_failed(
            clone_url,
            describe_failure(&output.status.to_string(), &stderr),
        ))
    }
}

/// Summarize a failed `git clone` from its exit status and stderr
pub(crate) fn describe_failure(status: &str, stderr: &str) -> String {
    let reason = if stderr.contains("Authentication failed") || stderr.contains("Permission denied")
    {
        Some("authentication failed")
    } else if stderr.contains("Could not resolve host") || stderr.contains("unable to access") {
        Some("network error")
    } else if stderr.contains("not found") || stderr.contains("does not exist") {
        Some("repository not found")
    } else {
        None
    };

    let last_line = stderr.lines().map(str::trim).rev().find(|l| !l.is_empty());

    match (reason, last_line) {
        (Some(reason), Some(line)) => format!("{} ({}): {}", reason, status, line),
        (Some(reason), None) => format!("{} ({})", reason, status),
        (None, Some(line)) => format!("git clone {}: {}", status, line),
        (None, None) => format!("git clone {}", status),
    }
}
