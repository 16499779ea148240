//! CSV reports under the reports directory.
//!
//! ```text
//! reports/
//!   all.csv, all_repo.csv, users.csv, emails.csv
//!   <owner>__<repo>/<owner>__<repo>.csv
//!   <owner>__<repo>/forks/<fork_owner>__<fork_repo>.csv
//!   <owner>__<repo>/forks/all_forks.csv
//! ```

use crate::api::{display_date, CommitRecord, FileChange, ForkRecord, RepoTarget, Result, UserProfile};
use log::debug;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Which cumulative CSV the commit rows are additionally appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CombineMode {
    /// Originals and forks to `all.csv`.
    All,
    /// Originals only to `all_repo.csv`.
    Repo,
    /// Forks only to the per-repository `forks/all_forks.csv`.
    Fork,
}

#[derive(Debug, Serialize)]
struct CommitRow<'a> {
    branch: &'a str,
    modified_file: &'a str,
    hash: &'a str,
    author_name: &'a str,
    author_email: &'a str,
    committer_name: &'a str,
    committer_email: &'a str,
    commit_date_utc: String,
    msg: &'a str,
    full_path: &'a str,
    change_type: String,
}

impl<'a> CommitRow<'a> {
    fn new(commit: &'a CommitRecord, file: Option<&'a FileChange>) -> Self {
        CommitRow {
            branch: &commit.branch,
            modified_file: file.map(FileChange::file_name).unwrap_or_default(),
            hash: &commit.hash,
            author_name: &commit.author.name,
            author_email: &commit.author.email,
            committer_name: &commit.committer.name,
            committer_email: &commit.committer.email,
            commit_date_utc: commit.date.to_rfc3339(),
            msg: commit.message.trim_end(),
            full_path: file.map(|file| file.path.as_str()).unwrap_or_default(),
            change_type: file.map(|file| file.change_type.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CombinedCommitRow<'a> {
    #[serde(rename = "owner/repo")]
    owner_repo: String,
    username: &'a str,
    repo_name: &'a str,
    branch: &'a str,
    modified_file: &'a str,
    hash: &'a str,
    author_name: &'a str,
    author_email: &'a str,
    committer_name: &'a str,
    committer_email: &'a str,
    commit_date_utc: String,
    msg: &'a str,
    full_path: &'a str,
    change_type: String,
}

impl<'a> CombinedCommitRow<'a> {
    fn new(owner_repo: &RepoTarget, scope: &'a RepoTarget, row: CommitRow<'a>) -> Self {
        CombinedCommitRow {
            owner_repo: owner_repo.full_name(),
            username: &scope.owner,
            repo_name: &scope.name,
            branch: row.branch,
            modified_file: row.modified_file,
            hash: row.hash,
            author_name: row.author_name,
            author_email: row.author_email,
            committer_name: row.committer_name,
            committer_email: row.committer_email,
            commit_date_utc: row.commit_date_utc,
            msg: row.msg,
            full_path: row.full_path,
            change_type: row.change_type,
        }
    }
}

/// Profile of a contributor of `repo`, after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserReport {
    pub repo: RepoTarget,
    pub profile: UserProfile,
    pub contributions: u32,
}

#[derive(Debug, Serialize)]
struct UserRow<'a> {
    repo: String,
    login: &'a str,
    name: &'a str,
    email: &'a str,
    location: &'a str,
    company: &'a str,
    website: &'a str,
    bio: &'a str,
    twitter: &'a str,
    created_at: String,
    updated_at: String,
    contributions: u32,
}

impl<'a> From<&'a UserReport> for UserRow<'a> {
    fn from(user: &'a UserReport) -> Self {
        let profile = &user.profile;
        UserRow {
            repo: user.repo.full_name(),
            login: &profile.login,
            name: profile.name.as_deref().unwrap_or_default(),
            email: profile.email.as_deref().unwrap_or_default(),
            location: profile.location.as_deref().unwrap_or_default(),
            company: profile.company.as_deref().unwrap_or_default(),
            website: profile.website.as_deref().unwrap_or_default(),
            bio: profile.bio.as_deref().unwrap_or_default(),
            twitter: profile.twitter.as_deref().unwrap_or_default(),
            created_at: display_date(&profile.created_at),
            updated_at: display_date(&profile.updated_at),
            contributions: user.contributions,
        }
    }
}

/// Emails found in the history of one repository owned by `username`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailFinding {
    pub username: String,
    pub repo: RepoTarget,
    pub emails: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EmailRow<'a> {
    username: &'a str,
    repo: String,
    emails: String,
}

pub struct ReportWriter {
    root: PathBuf,
    combine: Option<CombineMode>,
}

impl ReportWriter {
    pub fn new(root: impl Into<PathBuf>, combine: Option<CombineMode>) -> Self {
        ReportWriter {
            root: root.into(),
            combine,
        }
    }

    pub fn repo_dir(&self, target: &RepoTarget) -> PathBuf {
        self.root.join(target.slug())
    }

    pub fn repo_csv(&self, target: &RepoTarget) -> PathBuf {
        self.repo_dir(target).join(format!("{}.csv", target.slug()))
    }

    pub fn forks_dir(&self, parent: &RepoTarget) -> PathBuf {
        self.repo_dir(parent).join("forks")
    }

    pub fn fork_csv(&self, parent: &RepoTarget, fork: &RepoTarget) -> PathBuf {
        self.forks_dir(parent).join(format!("{}.csv", fork.slug()))
    }

    pub fn all_csv(&self) -> PathBuf {
        self.root.join("all.csv")
    }

    pub fn all_repo_csv(&self) -> PathBuf {
        self.root.join("all_repo.csv")
    }

    pub fn all_forks_csv(&self, parent: &RepoTarget) -> PathBuf {
        self.forks_dir(parent).join("all_forks.csv")
    }

    pub fn users_csv(&self) -> PathBuf {
        self.root.join("users.csv")
    }

    pub fn emails_csv(&self) -> PathBuf {
        self.root.join("emails.csv")
    }

    /// Rewrites the repository CSV and appends to `all.csv` or `all_repo.csv` per combining mode.
    pub fn write_repo(&self, target: &RepoTarget, commits: &[CommitRecord]) -> Result<PathBuf> {
        let path = self.repo_csv(target);
        write_rows(&path, commit_rows(commits), false)?;
        let combined = match self.combine {
            Some(CombineMode::All) => Some(self.all_csv()),
            Some(CombineMode::Repo) => Some(self.all_repo_csv()),
            Some(CombineMode::Fork) | None => None,
        };
        if let Some(combined) = combined {
            let rows = commit_rows(commits).map(|row| CombinedCommitRow::new(target, target, row));
            write_rows(&combined, rows, true)?;
        }
        Ok(path)
    }

    /// Rewrites the fork CSV and appends to `all.csv` or the parent's `all_forks.csv` per combining mode.
    pub fn write_fork(&self, parent: &RepoTarget, fork: &ForkRecord, commits: &[CommitRecord]) -> Result<PathBuf> {
        let path = self.fork_csv(parent, &fork.target);
        write_rows(&path, commit_rows(commits), false)?;
        let combined = match self.combine {
            Some(CombineMode::All) => Some(self.all_csv()),
            Some(CombineMode::Fork) => Some(self.all_forks_csv(parent)),
            Some(CombineMode::Repo) | None => None,
        };
        if let Some(combined) = combined {
            let rows = commit_rows(commits).map(|row| CombinedCommitRow::new(parent, &fork.target, row));
            write_rows(&combined, rows, true)?;
        }
        Ok(path)
    }

    pub fn append_users(&self, users: &[UserReport]) -> Result<()> {
        write_rows(&self.users_csv(), users.iter().map(UserRow::from), true)?;
        Ok(())
    }

    pub fn append_emails(&self, findings: &[EmailFinding]) -> Result<()> {
        let rows = findings.iter().map(|finding| EmailRow {
            username: &finding.username,
            repo: finding.repo.full_name(),
            emails: finding.emails.join(", "),
        });
        write_rows(&self.emails_csv(), rows, true)?;
        Ok(())
    }
}

/// One row per modified file, or a single row with empty file columns for commits touching none.
fn commit_rows(commits: &[CommitRecord]) -> impl Iterator<Item = CommitRow<'_>> {
    commits.iter().flat_map(|commit| {
        let files: Vec<Option<&FileChange>> = if commit.files.is_empty() {
            vec![None]
        } else {
            commit.files.iter().map(Some).collect()
        };
        files.into_iter().map(move |file| CommitRow::new(commit, file))
    })
}

/// Writes rows, with a header only when the file starts out empty. `append` keeps existing content.
fn write_rows<R: Serialize>(path: &Path, rows: impl IntoIterator<Item = R>, append: bool) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let has_content = append && fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(!has_content).from_writer(file);
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    debug!("Wrote {} rows to {}", count, path.display());
    Ok(count)
}
