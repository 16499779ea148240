use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use futures::stream::BoxStream;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API rate limit reached on every credential")]
    RateLimited,
    #[error("Malformed repository URL '{0}'")]
    Parse(String),
    #[error("Clone or traversal of {target} failed: {source}")]
    CloneOrTraversal {
        target: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to remove {}, re-run with elevated privileges: {source}", path.display())]
    FilesystemPermission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    // the only reason of `reqwest` dependency..
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "aggregator")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Repository identified by owner login and repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Constructor)]
pub struct RepoTarget {
    pub owner: String,
    pub name: String,
}

impl RepoTarget {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Directory and file stem used for reports and clones, `owner__name`.
    pub fn slug(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }

    pub fn clone_url(&self, base: &str) -> String {
        format!("{}/{}/{}", base.trim_end_matches('/'), self.owner, self.name)
    }
}

impl Display for RepoTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct RepoMetadata {
    pub target: RepoTarget,
    pub url: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub forks_count: u32,
    pub stargazers_count: u32,
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForkRecord {
    pub target: RepoTarget,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    /// Known once the fork has been cloned.
    pub branch_count: Option<usize>,
}

impl ForkRecord {
    pub fn new(target: RepoTarget, url: String) -> Self {
        ForkRecord {
            target,
            url,
            created_at: None,
            updated_at: None,
            pushed_at: None,
            branch_count: None,
        }
    }
}

impl Display for ForkRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "fork: {}\tcreated: {}\tpushed: {}\tbranches: {}",
            self.target,
            display_date(&self.created_at),
            display_date(&self.pushed_at),
            self.branch_count.map_or_else(|| "-".to_string(), |count| count.to_string())
        ))
    }
}

pub(crate) fn display_date(date: &Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "-".to_string(), |date| date.to_rfc3339())
}

#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct Contributor {
    pub login: String,
    pub contributions: u32,
}

/// Git identity, as recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Constructor)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    pub change_type: ChangeType,
}

impl FileChange {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub branch: String,
    pub hash: String,
    pub author: Identity,
    pub committer: Identity,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files: Vec<FileChange>,
}

/// Commit as listed by the GitHub API, carrying account logins next to git identities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiCommit {
    pub sha: String,
    pub author_login: Option<String>,
    pub committer_login: Option<String>,
    pub author: Identity,
    pub committer: Identity,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub twitter: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn repo(&self, target: &RepoTarget) -> Result<RepoMetadata>;

    async fn forks(&self, target: &RepoTarget) -> Result<Vec<ForkRecord>>;

    async fn contributors(&self, target: &RepoTarget) -> Result<Vec<Contributor>>;

    async fn commits(&self, target: &RepoTarget) -> Result<Vec<ApiCommit>>;

    async fn user(&self, login: &str) -> Result<UserProfile>;

    async fn user_repos(&self, login: &str) -> Result<Vec<RepoTarget>>;
}

pub type CommitStream = BoxStream<'static, Result<CommitRecord>>;

/// Version-control collaborator working on local clones.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clones `url` into `path`. A `mirror` clone is bare and carries every remote ref.
    async fn clone_repo(&self, url: &str, path: &Path, mirror: bool) -> Result<()>;

    async fn list_branches(&self, path: &Path) -> Result<Vec<String>>;

    /// Full history of `branch`, oldest commit first.
    fn traverse_commits(&self, path: &Path, branch: &str) -> CommitStream;
}
