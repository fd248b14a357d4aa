//! Configuration management for gh-backup
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GH_BACKUP_*)
//! 3. Config file (~/.config/gh-backup/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default API origin
pub const DEFAULT_API_ORIGIN: &str = "https://api.github.com";

/// Largest page size the listing endpoint accepts
pub const MAX_PER_PAGE: u8 = 100;

/// Upper bound on concurrent clones
pub const MAX_CONCURRENCY: usize = 32;

/// GitHub API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API origin, without trailing slash
    pub api_origin: String,

    /// Repositories requested per page
    pub per_page: u8,

    /// Timeout applied to each page request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_origin: DEFAULT_API_ORIGIN.to_string(),
            per_page: MAX_PER_PAGE,
            timeout: Duration::from_secs(10),
            user_agent: concat!("gh-backup/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Clone step settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Path to the git executable
    pub git_path: String,

    /// Number of clones allowed in flight at once
    pub concurrency: usize,

    /// Pass --quiet to git clone
    pub quiet: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            git_path: "git".to_string(),
            concurrency: 4,
            quiet: false,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// GitHub API configuration
    pub github: GitHubConfig,

    /// Clone configuration
    pub clone: CloneConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validated()
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gh-backup/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gh-backup").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GH_BACKUP_API_ORIGIN: API origin
    /// - GH_BACKUP_GIT_PATH: Path to git executable
    /// - GH_BACKUP_JOBS: Concurrent clones
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(origin) = std::env::var("GH_BACKUP_API_ORIGIN") {
            self.github.api_origin = origin;
        }

        if let Ok(git_path) = std::env::var("GH_BACKUP_GIT_PATH") {
            self.clone.git_path = git_path;
        }

        if let Ok(jobs) = std::env::var("GH_BACKUP_JOBS") {
            self.clone.concurrency = jobs
                .parse()
                .map_err(|_| Error::Config(format!("GH_BACKUP_JOBS is not a number: {}", jobs)))?;
        }

        self.validated()
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        api_origin: Option<String>,
        git_path: Option<String>,
        jobs: Option<usize>,
    ) -> Result<Self> {
        if let Some(origin) = api_origin {
            self.github.api_origin = origin;
        }

        if let Some(path) = git_path {
            self.clone.git_path = path;
        }

        if let Some(jobs) = jobs {
            self.clone.concurrency = jobs;
        }

        self.validated()
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        api_origin: Option<String>,
        git_path: Option<String>,
        jobs: Option<usize>,
    ) -> Result<Self> {
        Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(api_origin, git_path, jobs)
    }

    fn validated(mut self) -> Result<Self> {
        while self.github.api_origin.ends_with('/') {
            self.github.api_origin.pop();
        }
        if self.github.api_origin.is_empty() {
            return Err(Error::Config("api_origin must not be empty".to_string()));
        }
        if self.github.per_page == 0 || self.github.per_page > MAX_PER_PAGE {
            return Err(Error::Config(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.github.per_page
            )));
        }
        if self.clone.concurrency == 0 || self.clone.concurrency > MAX_CONCURRENCY {
            return Err(Error::Config(format!(
                "clone concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.clone.concurrency
            )));
        }
        Ok(self)
    }
}
