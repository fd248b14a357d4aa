//! Destination layout for a backup run
//!
//! A run either reuses the requested output directory (when it does not exist
//! yet and gets created) or nests a timestamped `github_{account}_{policy}_{stamp}`
//! directory inside it (when it already exists).

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::{Error, RepoTypePolicy, RepositoryRecord, Result};

/// Format of the timestamp embedded in generated directory names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Extension of produced archives
pub const ARCHIVE_EXTENSION: &str = "zip";

/// What the caller asked for
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Requested output directory
    pub output_dir: PathBuf,
    /// Account whose repositories are backed up
    pub account: String,
    /// Repo type policy for the run
    pub policy: RepoTypePolicy,
    /// Whether to compress the result
    pub compress: bool,
    /// Explicit archive name; its extension is replaced by `.zip`
    pub archive_name: Option<PathBuf>,
}

impl PlanRequest {
    /// Request with defaults: current directory, no compression
    pub fn new(account: impl Into<String>, policy: RepoTypePolicy) -> Self {
        Self {
            output_dir: PathBuf::from("."),
            account: account.into(),
            policy,
            compress: false,
            archive_name: None,
        }
    }
}

/// Where one listing entry goes, or why it has nowhere to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Clone into this path
    Path(PathBuf),
    /// No directory was assigned
    Rejected(String),
}

/// Computed layout for one run; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    destination_root: PathBuf,
    per_repo_paths: BTreeMap<String, PathBuf>,
    slots: Vec<(String, Slot)>,
    compress: bool,
    archive_path: Option<PathBuf>,
}

impl RunPlan {
    /// Directory all clones go under
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// Planned clone path for `repo_name`, if it has one
    pub fn repo_path(&self, repo_name: &str) -> Option<&Path> {
        self.per_repo_paths.get(repo_name).map(PathBuf::as_path)
    }

    /// All planned clone paths, keyed by repo name
    pub fn per_repo_paths(&self) -> &BTreeMap<String, PathBuf> {
        &self.per_repo_paths
    }

    /// Slot of the `index`-th repository of the listing the plan was built from
    ///
    /// `None` when the index is out of range or names a different repository.
    pub fn slot(&self, index: usize, repo_name: &str) -> Option<&Slot> {
        self.slots
            .get(index)
            .filter(|(name, _)| name == repo_name)
            .map(|(_, slot)| slot)
    }

    /// Whether the run ends with compression
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Archive to write, when compressing
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }
}

/// Name of the timestamped directory nested in an existing output directory
pub fn default_dir_name(account: &str, policy: RepoTypePolicy, now: NaiveDateTime) -> String {
    format!(
        "github_{}_{}_{}",
        account,
        policy,
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Pick destination_root given whether the output directory already exists
pub fn resolve_root(
    output_dir: &Path,
    account: &str,
    policy: RepoTypePolicy,
    now: NaiveDateTime,
    output_dir_exists: bool,
) -> PathBuf {
    let output_dir = normalize(output_dir);
    if output_dir_exists {
        output_dir.join(default_dir_name(account, policy, now))
    } else {
        output_dir
    }
}

/// Archive path for a run: the explicit name with a `.zip` extension, or
/// `{destination_root}.zip`
pub fn archive_path(destination_root: &Path, archive_name: Option<&Path>) -> PathBuf {
    match archive_name {
        Some(name) => name.with_extension(ARCHIVE_EXTENSION),
        None => {
            let mut path: OsString = normalize(destination_root).into_os_string();
            path.push(".");
            path.push(ARCHIVE_EXTENSION);
            PathBuf::from(path)
        }
    }
}

/// Escape embedded spaces so the path can be pasted into a shell command
pub fn shell_escaped(path: &Path) -> String {
    path.display().to_string().replace(' ', "\\ ")
}

/// Check that a repository name maps to exactly one directory under the root
pub fn validate_repo_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(Error::clone_failed(
            name,
            "repository name does not map to a directory under the destination",
        )),
    }
}

/// Compute the layout without touching the filesystem
pub fn preview(
    request: &PlanRequest,
    repos: &[RepositoryRecord],
    now: NaiveDateTime,
) -> RunPlan {
    let exists = request.output_dir.exists();
    build(request, repos, now, exists)
}

/// Compute the layout and create destination_root
///
/// Fails with [`Error::Filesystem`] when the directory cannot be created.
pub fn plan(
    request: &PlanRequest,
    repos: &[RepositoryRecord],
    now: NaiveDateTime,
) -> Result<RunPlan> {
    let exists = request.output_dir.exists();
    let run_plan = build(request, repos, now, exists);
    let root = run_plan.destination_root();

    if exists && root.exists() {
        warn!(path = %root.display(), "Destination already exists; reusing it");
    }

    fs::create_dir_all(root).map_err(|e| Error::filesystem(root, e))?;

    info!(
        destination_root = %root.display(),
        reused_output_dir = !exists,
        repos = run_plan.per_repo_paths.len(),
        "Planned backup layout"
    );

    Ok(run_plan)
}

fn build(
    request: &PlanRequest,
    repos: &[RepositoryRecord],
    now: NaiveDateTime,
    output_dir_exists: bool,
) -> RunPlan {
    let destination_root = resolve_root(
        &request.output_dir,
        &request.account,
        request.policy,
        now,
        output_dir_exists,
    );

    let mut per_repo_paths = BTreeMap::new();
    let mut slots = Vec::with_capacity(repos.len());
    // Keyed by lowercase name so case-insensitive filesystems cannot merge two repos
    let mut claimed: HashMap<String, &str> = HashMap::new();

    for repo in repos {
        let slot = match validate_repo_name(&repo.name) {
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "Skipping unsafe repository name");
                Slot::Rejected(
                    "repository name does not map to a directory under the destination"
                        .to_string(),
                )
            }
            Ok(()) => match claimed.get(&repo.name.to_lowercase()) {
                Some(first) => {
                    warn!(repo = %repo.name, first = %first, "Duplicate repository name in listing");
                    Slot::Rejected(format!(
                        "duplicate of repository '{}' earlier in the listing",
                        first
                    ))
                }
                None => {
                    claimed.insert(repo.name.to_lowercase(), &repo.name);
                    let path = destination_root.join(&repo.name);
                    debug!(repo = %repo.name, path = %shell_escaped(&path), "Planned clone path");
                    per_repo_paths.insert(repo.name.clone(), path.clone());
                    Slot::Path(path)
                }
            },
        };
        slots.push((repo.name.clone(), slot));
    }

    let archive_path = request
        .compress
        .then(|| archive_path(&destination_root, request.archive_name.as_deref()));

    RunPlan {
        destination_root,
        per_repo_paths,
        slots,
        compress: request.compress,
        archive_path,
    }
}

// Drops trailing separators and `.` segments so derived names stay clean.
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 59)
            .unwrap()
    }

    fn repos() -> Vec<RepositoryRecord> {
        vec![
            RepositoryRecord::new("a", "https://x/a.git", false),
            RepositoryRecord::new("my repo", "https://x/my%20repo.git", false),
        ]
    }

    #[test]
    fn test_default_dir_name() {
        assert_eq!(
            default_dir_name("alice", RepoTypePolicy::Source, fixed_now()),
            "github_alice_source_2024-03-09_07-05"
        );
    }

    #[test]
    fn test_resolve_root_branches() {
        let out = Path::new("backups");
        assert_eq!(
            resolve_root(out, "alice", RepoTypePolicy::All, fixed_now(), false),
            PathBuf::from("backups")
        );
        assert_eq!(
            resolve_root(out, "alice", RepoTypePolicy::All, fixed_now(), true),
            PathBuf::from("backups/github_alice_all_2024-03-09_07-05")
        );
        assert_eq!(
            resolve_root(Path::new("."), "bob", RepoTypePolicy::Fork, fixed_now(), true),
            PathBuf::from("./github_bob_fork_2024-03-09_07-05")
        );
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(
            archive_path(Path::new("out/"), None),
            PathBuf::from("out.zip")
        );
        assert_eq!(
            archive_path(Path::new("./github_a_all_x"), Some(Path::new("mine.tar"))),
            PathBuf::from("mine.zip")
        );
        assert_eq!(
            archive_path(Path::new("root"), Some(Path::new("mine"))),
            PathBuf::from("mine.zip")
        );
    }

    #[test]
    fn test_shell_escaped() {
        assert_eq!(shell_escaped(Path::new("a b/c d")), "a\\ b/c\\ d");
        assert_eq!(shell_escaped(Path::new("plain")), "plain");
    }

    #[test]
    fn test_validate_repo_name() {
        assert!(validate_repo_name("dotfiles").is_ok());
        assert!(validate_repo_name(".github").is_ok());
        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("..").is_err());
        assert!(validate_repo_name(".").is_err());
        assert!(validate_repo_name("a/b").is_err());
        assert!(validate_repo_name("/etc").is_err());
    }

    #[test]
    fn test_plan_creates_missing_output_dir() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("fresh");
        let request = PlanRequest {
            output_dir: out.clone(),
            ..PlanRequest::new("alice", RepoTypePolicy::Source)
        };

        let run_plan = plan(&request, &repos(), fixed_now()).unwrap();

        assert_eq!(run_plan.destination_root(), out.as_path());
        assert!(out.is_dir());
        assert_eq!(run_plan.repo_path("a"), Some(out.join("a").as_path()));
        assert_eq!(
            run_plan.repo_path("my repo"),
            Some(out.join("my repo").as_path())
        );
        assert!(run_plan.archive_path().is_none());
    }

    #[test]
    fn test_plan_nests_in_existing_output_dir() {
        let temp = TempDir::new().unwrap();
        let request = PlanRequest {
            output_dir: temp.path().to_path_buf(),
            compress: true,
            ..PlanRequest::new("alice", RepoTypePolicy::Source)
        };

        let run_plan = plan(&request, &repos(), fixed_now()).unwrap();

        let expected = temp.path().join("github_alice_source_2024-03-09_07-05");
        assert_eq!(run_plan.destination_root(), expected.as_path());
        assert!(expected.is_dir());
        assert_eq!(
            run_plan.archive_path(),
            Some(temp.path().join("github_alice_source_2024-03-09_07-05.zip").as_path())
        );
    }

    #[test]
    fn test_plan_is_deterministic_for_same_state() {
        let temp = TempDir::new().unwrap();
        let request = PlanRequest {
            output_dir: temp.path().to_path_buf(),
            ..PlanRequest::new("alice", RepoTypePolicy::All)
        };

        let first = plan(&request, &repos(), fixed_now()).unwrap();
        let second = plan(&request, &repos(), fixed_now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_preview_does_not_create() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("not-yet");
        let request = PlanRequest {
            output_dir: out.clone(),
            ..PlanRequest::new("alice", RepoTypePolicy::Source)
        };

        let run_plan = preview(&request, &repos(), fixed_now());
        assert_eq!(run_plan.destination_root(), out.as_path());
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_reports_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let request = PlanRequest {
            output_dir: blocker.join("child"),
            ..PlanRequest::new("alice", RepoTypePolicy::Source)
        };

        let err = plan(&request, &repos(), fixed_now()).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn test_unsafe_names_are_left_out() {
        let request = PlanRequest::new("alice", RepoTypePolicy::All);
        let records = vec![
            RepositoryRecord::new("ok", "https://x/ok.git", false),
            RepositoryRecord::new("..", "https://x/dotdot.git", false),
        ];
        let run_plan = preview(&request, &records, fixed_now());
        assert!(run_plan.repo_path("ok").is_some());
        assert!(run_plan.repo_path("..").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_first_only() {
        let request = PlanRequest::new("alice", RepoTypePolicy::All);
        let records = vec![
            RepositoryRecord::new("a", "https://x/alice/a.git", false),
            RepositoryRecord::new("b", "https://x/alice/b.git", false),
            RepositoryRecord::new("a", "https://x/other/a.git", false),
            RepositoryRecord::new("B", "https://x/alice/B.git", false),
        ];
        let run_plan = preview(&request, &records, fixed_now());

        let root = run_plan.destination_root().to_path_buf();
        assert_eq!(run_plan.slot(0, "a"), Some(&Slot::Path(root.join("a"))));
        assert_eq!(run_plan.slot(1, "b"), Some(&Slot::Path(root.join("b"))));
        assert!(matches!(run_plan.slot(2, "a"), Some(Slot::Rejected(r)) if r.contains("duplicate")));
        assert!(matches!(run_plan.slot(3, "B"), Some(Slot::Rejected(r)) if r.contains("'b'")));
        assert_eq!(run_plan.per_repo_paths().len(), 2);
    }

    #[test]
    fn test_slot_checks_index_and_name() {
        let request = PlanRequest::new("alice", RepoTypePolicy::All);
        let run_plan = preview(&request, &repos(), fixed_now());
        assert!(run_plan.slot(0, "a").is_some());
        assert!(run_plan.slot(0, "my repo").is_none());
        assert!(run_plan.slot(5, "a").is_none());
    }
}
