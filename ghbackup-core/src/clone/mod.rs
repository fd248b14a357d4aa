//! Clone Driver: runs the clone capability for every selected repository
//!
//! Each repository is an independent unit of work. A failed clone is recorded
//! and the remaining clones still run; callers decide what to do with the
//! aggregate via [`into_result`].

mod git;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

pub use git::GitCloner;

use crate::planner::{RunPlan, Slot};
use crate::{Error, RepositoryRecord, Result};

/// Capability that materializes a repository at a local path
#[async_trait]
pub trait Cloner: Send + Sync {
    /// Clone `clone_url` into `dest`; `dest` must not exist yet
    async fn clone_repo(&self, clone_url: &str, dest: &Path) -> Result<()>;
}

/// Terminal state of one clone attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStatus {
    Succeeded,
    Failed,
}

/// Result of attempting to clone one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    /// Repository name
    pub repo_name: String,
    /// Whether the clone succeeded
    pub status: CloneStatus,
    /// Clone path on success, failure reason otherwise
    pub detail: String,
}

impl CloneOutcome {
    fn succeeded(repo_name: &str, path: &Path) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            status: CloneStatus::Succeeded,
            detail: path.display().to_string(),
        }
    }

    fn failed(repo_name: &str, detail: impl fmt::Display) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            status: CloneStatus::Failed,
            detail: detail.to_string(),
        }
    }

    /// Whether this clone succeeded
    pub fn is_success(&self) -> bool {
        self.status == CloneStatus::Succeeded
    }
}

/// Turn a batch of outcomes into an aggregate error if anything failed
pub fn into_result(outcomes: &[CloneOutcome]) -> Result<()> {
    let repos: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.repo_name.clone())
        .collect();

    if repos.is_empty() {
        return Ok(());
    }

    Err(Error::CloneFailures {
        failed: repos.len(),
        attempted: outcomes.len(),
        repos,
    })
}

/// Drives a [`Cloner`] over the repositories of a [`RunPlan`]
pub struct CloneDriver<'a> {
    cloner: &'a dyn Cloner,
    concurrency: usize,
}

impl<'a> CloneDriver<'a> {
    /// Create a driver allowing `concurrency` clones in flight (minimum 1)
    pub fn new(cloner: &'a dyn Cloner, concurrency: usize) -> Self {
        Self {
            cloner,
            concurrency: concurrency.max(1),
        }
    }

    /// Attempt every repository, returning one outcome per repo in input order
    ///
    /// `repos` must be the listing `plan` was built from. Fails only when
    /// destination_root is missing; individual clone failures are reported in
    /// the outcomes.
    pub async fn clone_all(
        &self,
        plan: &RunPlan,
        repos: &[RepositoryRecord],
    ) -> Result<Vec<CloneOutcome>> {
        let root = plan.destination_root();
        if !root.is_dir() {
            return Err(Error::filesystem(
                root,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "destination root must exist before cloning",
                ),
            ));
        }

        info!(
            repos = repos.len(),
            concurrency = self.concurrency,
            destination_root = %root.display(),
            "Cloning repositories"
        );

        let mut indexed: Vec<(usize, CloneOutcome)> = stream::iter(repos.iter().enumerate())
            .map(|(index, repo)| async move { (index, self.clone_one(plan, index, repo).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<CloneOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            attempted = outcomes.len(),
            failed,
            "Clone step finished"
        );

        Ok(outcomes)
    }

    async fn clone_one(&self, plan: &RunPlan, index: usize, repo: &RepositoryRecord) -> CloneOutcome {
        let path = match plan.slot(index, &repo.name) {
            Some(Slot::Path(path)) => path.as_path(),
            Some(Slot::Rejected(reason)) => {
                warn!(repo = %repo.name, reason = %reason, "No clone path planned");
                return CloneOutcome::failed(&repo.name, Error::clone_failed(&repo.name, reason));
            }
            None => {
                warn!(repo = %repo.name, index, "Repository is not part of the plan");
                return CloneOutcome::failed(
                    &repo.name,
                    Error::clone_failed(&repo.name, "repository is not part of the run plan"),
                );
            }
        };

        if path.exists() {
            warn!(repo = %repo.name, path = %path.display(), "Clone path already exists");
            return CloneOutcome::failed(
                &repo.name,
                format!("destination {} already exists", path.display()),
            );
        }

        info!(repo = %repo.name, url = %repo.clone_url, "Cloning repository");

        match self.cloner.clone_repo(&repo.clone_url, path).await {
            Ok(()) => {
                info!(repo = %repo.name, path = %path.display(), "Cloned repository");
                CloneOutcome::succeeded(&repo.name, path)
            }
            Err(e) => {
                let e = match e {
                    Error::Clone { detail, .. } => Error::clone_failed(&repo.name, detail),
                    other => other,
                };
                warn!(repo = %repo.name, error = %e, "Clone failed");
                CloneOutcome::failed(&repo.name, e)
            }
        }
    }
}
