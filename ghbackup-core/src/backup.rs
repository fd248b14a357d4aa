//! The backup pipeline: list, filter, plan, clone, archive

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::archive::{ArchiveSummary, Archiver};
use crate::clone::{self, CloneDriver, CloneOutcome, Cloner};
use crate::planner::{self, PlanRequest, RunPlan};
use crate::{AccountKind, Config, Error, RepositoryRecord, Result};

/// Source of repository listings for an account
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Every repository owned by `account`, in listing order
    async fn list_repositories(
        &self,
        account: &str,
        kind: AccountKind,
    ) -> Result<Vec<RepositoryRecord>>;
}

/// One backup invocation
#[derive(Debug, Clone)]
pub struct BackupRequest {
    /// Whether the account is a user or an organization
    pub kind: AccountKind,
    /// Account, policy and layout options
    pub layout: PlanRequest,
}

/// What a run would do, without doing it
#[derive(Debug, Clone)]
pub struct BackupPreview {
    /// Layout the run would use
    pub plan: RunPlan,
    /// Repositories that would be cloned
    pub included: Vec<RepositoryRecord>,
    /// Repositories the policy filters out
    pub skipped: Vec<RepositoryRecord>,
}

/// Outcome of a completed run
#[derive(Debug)]
pub struct BackupReport {
    /// Directory the clones were placed in
    pub destination_root: PathBuf,
    /// One outcome per attempted clone, in listing order
    pub outcomes: Vec<CloneOutcome>,
    /// Names of repositories the policy filtered out
    pub skipped: Vec<String>,
    /// The archive, when compression was requested and succeeded
    pub archive: Option<ArchiveSummary>,
    /// Why compression failed; the uncompressed tree is left in place
    pub archive_error: Option<Error>,
}

impl BackupReport {
    /// Number of successful clones
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &CloneOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// The archive error if compression failed, else `Err(CloneFailures)`
    /// if any clone failed
    pub fn into_result(mut self) -> Result<Self> {
        if let Some(err) = self.archive_error.take() {
            return Err(err);
        }
        clone::into_result(&self.outcomes)?;
        Ok(self)
    }
}

/// Wires a [`RepoSource`] and a [`Cloner`] into the full pipeline
pub struct Backup<'a> {
    source: &'a dyn RepoSource,
    cloner: &'a dyn Cloner,
    config: &'a Config,
    archiver: Archiver,
}

impl<'a> Backup<'a> {
    /// Create a pipeline
    pub fn new(source: &'a dyn RepoSource, cloner: &'a dyn Cloner, config: &'a Config) -> Self {
        Self {
            source,
            cloner,
            config,
            archiver: Archiver::new(),
        }
    }

    async fn select(
        &self,
        request: &BackupRequest,
    ) -> Result<(Vec<RepositoryRecord>, Vec<RepositoryRecord>)> {
        let account = &request.layout.account;
        let records = self.source.list_repositories(account, request.kind).await?;
        let total = records.len();
        let (included, skipped) = request.layout.policy.select(records);

        info!(
            account = %account,
            kind = %request.kind,
            policy = %request.layout.policy,
            total,
            included = included.len(),
            "Selected repositories"
        );

        if included.is_empty() {
            warn!(account = %account, policy = %request.layout.policy, "No repositories match the requested type");
        }

        Ok((included, skipped))
    }

    /// List and plan without creating directories or cloning
    pub async fn preview(&self, request: &BackupRequest, now: NaiveDateTime) -> Result<BackupPreview> {
        let (included, skipped) = self.select(request).await?;
        let plan = planner::preview(&request.layout, &included, now);
        Ok(BackupPreview {
            plan,
            included,
            skipped,
        })
    }

    /// Run the whole pipeline
    ///
    /// Clone failures do not abort the run: the successful clones are still
    /// archived and the failures are reported in [`BackupReport::outcomes`].
    /// An archive failure is reported in [`BackupReport::archive_error`] next
    /// to those outcomes.
    pub async fn run(&self, request: &BackupRequest, now: NaiveDateTime) -> Result<BackupReport> {
        let (included, skipped) = self.select(request).await?;

        let plan = planner::plan(&request.layout, &included, now)?;

        let outcomes = CloneDriver::new(self.cloner, self.config.clone.concurrency)
            .clone_all(&plan, &included)
            .await?;

        let (archive, archive_error) = match plan.archive_path() {
            Some(archive_path) if plan.compress() => {
                match self.archive(plan.destination_root(), archive_path).await {
                    Ok(summary) => (Some(summary), None),
                    Err(e) => {
                        warn!(
                            error = %e,
                            destination_root = %plan.destination_root().display(),
                            failed_clones = outcomes.iter().filter(|o| !o.is_success()).count(),
                            "Archive failed; keeping uncompressed copy"
                        );
                        (None, Some(e))
                    }
                }
            }
            _ => (None, None),
        };

        Ok(BackupReport {
            destination_root: plan.destination_root().to_path_buf(),
            outcomes,
            skipped: skipped.into_iter().map(|r| r.name).collect(),
            archive,
            archive_error,
        })
    }

    async fn archive(&self, root: &Path, archive_path: &Path) -> Result<ArchiveSummary> {
        let archiver = self.archiver;
        let root = root.to_path_buf();
        let archive_path = archive_path.to_path_buf();
        let task_path = archive_path.clone();

        tokio::task::spawn_blocking(move || archiver.compress(&root, &task_path))
            .await
            .map_err(|e| Error::Archive {
                path: archive_path,
                message: format!("archive task failed: {}", e),
            })?
    }
}
