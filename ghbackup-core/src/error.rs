//! Error types for gh-backup

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for gh-backup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gh-backup operations
///
/// Every variant names the stage that failed and the target it failed on.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeout or connection failure talking to the API origin
    #[error("Network error requesting {url}: {message}")]
    Transient { url: String, message: String },

    /// Non-success HTTP status from the listing endpoint
    #[error("Listing failed: got HTTP {status} from {url}")]
    Remote { status: u16, url: String },

    /// The listing endpoint answered with something that is not a repository list
    #[error("Unexpected response from {url}: {message}")]
    Protocol { url: String, message: String },

    /// Credential exchange was rejected
    #[error("Authorization failed: got HTTP {status} from {url}")]
    Auth { status: u16, url: String },

    /// A single repository could not be cloned
    #[error("Clone of {repo} failed: {detail}")]
    Clone { repo: String, detail: String },

    /// One or more clones failed during the run
    #[error("{failed} of {attempted} clone(s) failed: {}", repos.join(", "))]
    CloneFailures {
        failed: usize,
        attempted: usize,
        repos: Vec<String>,
    },

    /// Directory creation or deletion failed
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be written
    #[error("Archive error writing {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a filesystem error for `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Build a clone error for `repo`
    pub fn clone_failed(repo: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Clone {
            repo: repo.into(),
            detail: detail.into(),
        }
    }

    /// Whether retrying the same call might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }
}
