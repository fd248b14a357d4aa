//! Pre-issued access tokens
//!
//! A token can stand in for the username/password exchange. It is taken from
//! `GITHUB_TOKEN` when set, otherwise from the `[github] token` key of
//! `~/.config/gh-backup/secrets.toml`. On Unix that file is only read when no
//! one but its owner can access it.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Environment variable checked before the token file
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Where a token was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    File(PathBuf),
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Environment => write!(f, "{} environment variable", TOKEN_ENV),
            TokenSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A token together with where it came from
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    source: TokenSource,
}

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    pub fn into_secret(self) -> String {
        self.secret
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TokenFile {
    github: TokenSection,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TokenSection {
    token: Option<String>,
}

/// Looks up a pre-issued token
#[derive(Debug, Clone)]
pub struct TokenStore {
    file: Option<PathBuf>,
}

impl TokenStore {
    /// Store backed by `file`
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
        }
    }

    /// Store backed by `~/.config/gh-backup/secrets.toml`, when a config
    /// directory exists
    pub fn at_default_location() -> Self {
        Self {
            file: dirs::config_dir().map(|p| p.join("gh-backup").join("secrets.toml")),
        }
    }

    /// The token file this store reads
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Find a token: `GITHUB_TOKEN` first, then the token file
    pub fn lookup(&self) -> Result<Option<AccessToken>> {
        self.lookup_with(std::env::var(TOKEN_ENV).ok())
    }

    /// [`TokenStore::lookup`] with the environment value passed in
    pub fn lookup_with(&self, env_value: Option<String>) -> Result<Option<AccessToken>> {
        if let Some(secret) = env_value.as_deref().and_then(non_blank) {
            return Ok(Some(AccessToken {
                secret,
                source: TokenSource::Environment,
            }));
        }

        let Some(path) = &self.file else {
            return Ok(None);
        };

        let token = read_token_file(path)?.map(|secret| AccessToken {
            secret,
            source: TokenSource::File(path.clone()),
        });
        if token.is_none() {
            debug!(path = %path.display(), "No token configured");
        }
        Ok(token)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_token_file(path: &Path) -> Result<Option<String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::filesystem(path, e)),
    };

    check_private(path)?;

    let file: TokenFile = toml::from_str(&contents).map_err(|e| {
        Error::Config(format!("Failed to parse token file {}: {}", path.display(), e))
    })?;

    Ok(file.github.token.as_deref().and_then(non_blank))
}

#[cfg(unix)]
fn check_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)
        .map_err(|e| Error::filesystem(path, e))?
        .permissions()
        .mode()
        & 0o777;

    if mode & 0o077 != 0 {
        return Err(Error::Config(format!(
            "Token file {} is accessible to other users (mode {:o}); run: chmod 600 {}",
            path.display(),
            mode,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_private(_path: &Path) -> Result<()> {
    Ok(())
}
