//! gh-backup core - repository backup pipeline
//!
//! This crate decides which repositories of an account to back up, where to
//! put them, clones them through a pluggable [`Cloner`], and optionally packs
//! the result into a zip archive.

pub mod archive;
pub mod backup;
pub mod clone;
pub mod config;
pub mod error;
pub mod planner;
pub mod policy;
pub mod repo;
pub mod token;

pub use archive::{ArchiveSummary, Archiver};
pub use backup::{Backup, BackupPreview, BackupReport, BackupRequest, RepoSource};
pub use clone::{CloneDriver, CloneOutcome, CloneStatus, Cloner, GitCloner};
pub use config::{CloneConfig, Config, GitHubConfig};
pub use error::{Error, Result};
pub use planner::{PlanRequest, RunPlan, Slot};
pub use policy::{should_include, RepoTypePolicy};
pub use repo::{AccountKind, RepositoryRecord};
pub use token::{AccessToken, TokenSource, TokenStore};
