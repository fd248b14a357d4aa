//! Backup command - clone every repository of an account

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use ghbackup_core::planner::shell_escaped;
use ghbackup_core::{
    AccountKind, Backup, BackupPreview, BackupReport, BackupRequest, Config, GitCloner,
    PlanRequest, RepoTypePolicy, Slot, TokenStore,
};
use ghbackup_github::{Credentials, GitHubClient};

use crate::prompt::CredentialPrompt;

/// Arguments for a backup run
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// GitHub user or organization name
    pub name: String,

    /// Treat the name as an organization instead of a user
    #[arg(short = 'o', long = "org")]
    pub org: bool,

    /// Compress the backup into a zip archive and remove the directory
    #[arg(short = 'c', long)]
    pub compress: bool,

    /// Enter GitHub username/password interactively (hides password)
    #[arg(short = 'a', long)]
    pub auth: bool,

    /// GitHub username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// GitHub password
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Archive name; any extension is replaced by .zip
    #[arg(short = 'f', long = "outfile")]
    pub outfile: Option<PathBuf>,

    /// Directory to place the backup in
    #[arg(short = 'd', long, default_value = ".")]
    pub directory: PathBuf,

    /// Which repositories to back up: source, fork or all
    #[arg(short = 't', long = "type", default_value = "source")]
    pub repo_type: RepoTypePolicy,

    /// Number of clones to run at once (overrides config file)
    #[arg(short = 'j', long, env = "GH_BACKUP_JOBS")]
    pub jobs: Option<usize>,

    /// API origin (overrides config file)
    #[arg(long = "api-url", env = "GH_BACKUP_API_ORIGIN")]
    pub api_url: Option<String>,

    /// Path to the git executable (overrides config file)
    #[arg(long = "git", env = "GH_BACKUP_GIT_PATH")]
    pub git: Option<String>,

    /// List what would be cloned and where, without creating anything
    #[arg(long)]
    pub dry_run: bool,
}

impl BackupArgs {
    fn kind(&self) -> AccountKind {
        if self.org {
            AccountKind::Organization
        } else {
            AccountKind::User
        }
    }

    fn request(&self) -> BackupRequest {
        BackupRequest {
            kind: self.kind(),
            layout: PlanRequest {
                output_dir: self.directory.clone(),
                account: self.name.clone(),
                policy: self.repo_type,
                compress: self.compress,
                archive_name: self.outfile.clone(),
            },
        }
    }

    /// Credentials to exchange for a token, if the user supplied any
    ///
    /// `--auth` always prompts; otherwise both `--username` and `--password`
    /// must be given.
    pub fn credentials(&self, prompt: &dyn CredentialPrompt) -> anyhow::Result<Option<Credentials>> {
        if self.auth {
            let credentials = prompt
                .credentials()
                .context("Failed to read credentials")?;
            return Ok(Some(credentials));
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                Ok(Some(Credentials::new(username.clone(), password.clone())))
            }
            (None, None) => Ok(None),
            _ => {
                tracing::warn!("Both --username and --password are needed; ignoring the one given");
                Ok(None)
            }
        }
    }

    async fn client(
        &self,
        config: &Config,
        prompt: &dyn CredentialPrompt,
    ) -> anyhow::Result<GitHubClient> {
        let client = GitHubClient::new(&config.github)?;

        if let Some(credentials) = self.credentials(prompt)? {
            let token = client
                .exchange_credentials(&credentials)
                .await
                .map_err(ghbackup_core::Error::from)?;
            return Ok(client.with_token(token));
        }

        match TokenStore::at_default_location().lookup()? {
            Some(token) => Ok(client.with_access_token(token)),
            None => Ok(client),
        }
    }

    /// Execute the backup
    pub async fn execute(
        &self,
        verbose: bool,
        config: &Config,
        prompt: &dyn CredentialPrompt,
    ) -> anyhow::Result<()> {
        if verbose {
            tracing::info!(
                account = %self.name,
                kind = %self.kind(),
                policy = %self.repo_type,
                directory = %self.directory.display(),
                compress = self.compress,
                api_origin = %config.github.api_origin,
                concurrency = config.clone.concurrency,
                "Starting backup"
            );
        }

        let client = self.client(config, prompt).await?;
        let cloner = GitCloner::new(&config.clone);
        let backup = Backup::new(&client, &cloner, config);
        let request = self.request();
        let now = Local::now().naive_local();

        if self.dry_run {
            let preview = backup.preview(&request, now).await?;
            print_preview(&preview, cloner.git_path());
            return Ok(());
        }

        let report = backup.run(&request, now).await?;
        print_report(&report);
        report.into_result()?;

        Ok(())
    }
}

fn print_preview(preview: &BackupPreview, git: &str) {
    let plan = &preview.plan;
    println!("[Dry run] Destination: {}", shell_escaped(plan.destination_root()));
    for (index, repo) in preview.included.iter().enumerate() {
        match plan.slot(index, &repo.name) {
            Some(Slot::Path(path)) => {
                println!("  {} clone {} {}", git, repo.clone_url, shell_escaped(path))
            }
            Some(Slot::Rejected(reason)) => println!("  (not cloning {}: {})", repo.name, reason),
            None => {}
        }
    }
    if !preview.skipped.is_empty() {
        println!("  ({} repositories skipped by type filter)", preview.skipped.len());
    }
    if let Some(archive) = plan.archive_path().filter(|_| plan.compress()) {
        println!("[Dry run] Archive: {}", shell_escaped(archive));
    }
}

fn print_report(report: &BackupReport) {
    println!(
        "Cloned {} of {} repositories into {}",
        report.succeeded(),
        report.outcomes.len(),
        report.destination_root.display()
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} by type filter", report.skipped.len());
    }
    for failure in report.failures() {
        println!("  failed: {}: {}", failure.repo_name, failure.detail);
    }
    if let Some(archive) = &report.archive {
        println!(
            "Archive: {} ({} files, {} bytes)",
            archive.archive_path.display(),
            archive.files,
            archive.bytes
        );
    }
    if report.archive_error.is_some() {
        println!(
            "Archive not written; uncompressed copy kept at {}",
            report.destination_root.display()
        );
    }
}
