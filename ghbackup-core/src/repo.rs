//! Repository records as returned by the listing endpoint

use std::fmt;

use serde::{Deserialize, Serialize};

/// A repository from an account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Repository name, unique within one account
    pub name: String,
    /// HTTPS clone URL
    pub clone_url: String,
    /// Whether the repository is a fork of another
    #[serde(rename = "fork")]
    pub is_fork: bool,
}

impl RepositoryRecord {
    /// Create a new record
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>, is_fork: bool) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
            is_fork,
        }
    }
}

/// Kind of account that owns the repositories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountKind {
    #[default]
    User,
    Organization,
}

impl AccountKind {
    /// URL path segment used by the listing endpoint
    pub fn path_segment(&self) -> &'static str {
        match self {
            AccountKind::User => "users",
            AccountKind::Organization => "orgs",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::User => write!(f, "user"),
            AccountKind::Organization => write!(f, "organization"),
        }
    }
}
