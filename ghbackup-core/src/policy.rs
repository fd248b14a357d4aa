//! Repository type selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, RepositoryRecord, Result};

/// Which repositories of an account get backed up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoTypePolicy {
    /// Repositories that are not forks
    #[default]
    Source,
    /// Forks only
    Fork,
    /// Everything
    All,
}

impl RepoTypePolicy {
    /// All accepted values, in the order shown to users
    pub const VALUES: [RepoTypePolicy; 3] =
        [RepoTypePolicy::Source, RepoTypePolicy::Fork, RepoTypePolicy::All];

    /// Lowercase name, as used in directory names and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoTypePolicy::Source => "source",
            RepoTypePolicy::Fork => "fork",
            RepoTypePolicy::All => "all",
        }
    }

    /// Split a listing into (included, skipped), keeping listing order
    pub fn select(
        &self,
        records: Vec<RepositoryRecord>,
    ) -> (Vec<RepositoryRecord>, Vec<RepositoryRecord>) {
        records
            .into_iter()
            .partition(|r| should_include(*self, r.is_fork))
    }
}

impl fmt::Display for RepoTypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoTypePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(RepoTypePolicy::Source),
            "fork" => Ok(RepoTypePolicy::Fork),
            "all" => Ok(RepoTypePolicy::All),
            other => Err(Error::Config(format!(
                "Invalid repo type '{}': valid values are source, fork, all",
                other
            ))),
        }
    }
}

/// Decide whether a repository is eligible under `policy`
pub fn should_include(policy: RepoTypePolicy, is_fork: bool) -> bool {
    match policy {
        RepoTypePolicy::All => true,
        RepoTypePolicy::Fork => is_fork,
        RepoTypePolicy::Source => !is_fork,
    }
}
