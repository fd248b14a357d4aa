//! CLI command implementations

pub mod backup;

pub use backup::BackupArgs;
