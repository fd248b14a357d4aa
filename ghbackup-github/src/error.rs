//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// Request did not complete within the configured timeout
    #[error("Request to {url} timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connection-level failure (DNS, refused, reset)
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status from the listing endpoint
    #[error("GitHub API error: got HTTP {status} from {url}")]
    Remote { status: u16, url: String },

    /// Credential exchange rejected
    #[error("GitHub authentication error: got HTTP {status} from {url}")]
    Auth { status: u16, url: String },

    /// Response body could not be interpreted
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    /// Invalid API origin or account
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Classify a transport error raised while requesting `url`
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Error::Timeout {
                url: url.to_string(),
                source,
            }
        } else {
            Error::Http {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Http { .. })
    }
}

impl From<Error> for ghbackup_core::Error {
    fn from(err: Error) -> Self {
        use ghbackup_core::Error as Core;

        match err {
            Error::Timeout { url, source } | Error::Http { url, source } => Core::Transient {
                url,
                message: source.to_string(),
            },
            Error::Remote { status, url } => Core::Remote { status, url },
            Error::Auth { status, url } => Core::Auth { status, url },
            Error::Parse { url, message } => Core::Protocol { url, message },
            Error::InvalidUrl(message) => Core::Config(message),
        }
    }
}
