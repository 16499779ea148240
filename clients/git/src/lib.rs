use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use git2::build::RepoBuilder;
use git2::{BranchType, Commit, Delta, DiffFindOptions, Repository, Signature, Sort};
use gitsearch::api::{ChangeType, CommitRecord, CommitStream, Error, FileChange, Identity, Result, Vcs};
use log::{debug, info, trace};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const MIRROR_REFSPEC: &str = "+refs/*:refs/*";
const CHANNEL_CAPACITY: usize = 64;

/// [`Vcs`] over local clones, backed by libgit2.
#[derive(Debug, Default, Clone)]
pub struct GitClient;

#[async_trait]
impl Vcs for GitClient {
    async fn clone_repo(&self, url: &str, path: &Path, mirror: bool) -> Result<()> {
        let (url, path) = (url.to_string(), path.to_path_buf());
        let target = url.clone();
        tokio::task::spawn_blocking(move || clone_blocking(&url, &path, mirror))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|source| Error::CloneOrTraversal { target, source })
    }

    async fn list_branches(&self, path: &Path) -> Result<Vec<String>> {
        let path = path.to_path_buf();
        let target = path.display().to_string();
        tokio::task::spawn_blocking(move || branches_blocking(&path))
            .await
            .map_err(anyhow::Error::from)?
            .map_err(|source| Error::CloneOrTraversal { target, source })
    }

    fn traverse_commits(&self, path: &Path, branch: &str) -> CommitStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (path, branch) = (path.to_path_buf(), branch.to_string());
        tokio::task::spawn_blocking(move || {
            if let Err(source) = walk_branch(&path, &branch, &tx) {
                let target = format!("{}@{}", path.display(), branch);
                // the receiver may be gone already, nothing left to report to
                let _ = tx.blocking_send(Err(Error::CloneOrTraversal { target, source }));
            }
        });
        ReceiverStream::new(rx).boxed()
    }
}

fn clone_blocking(url: &str, path: &Path, mirror: bool) -> anyhow::Result<()> {
    if path.exists() {
        debug!("Removing stale clone at {}", path.display());
        std::fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!("Cloning {} into {}{}", url, path.display(), if mirror { " (mirror)" } else { "" });
    let mut builder = RepoBuilder::new();
    if mirror {
        builder
            .bare(true)
            .remote_create(|repo, name, url| repo.remote_with_fetch(name, url, MIRROR_REFSPEC));
    }
    builder.clone(url, path).with_context(|| format!("Failed to clone {}", url))?;
    Ok(())
}

/// Local branches and `origin` branches merged by name, sorted.
fn branches_blocking(path: &Path) -> anyhow::Result<Vec<String>> {
    let repo = Repository::open(path).context("Failed to open repository")?;
    let mut names = BTreeSet::new();
    for branch in repo.branches(None)? {
        let (branch, kind) = branch?;
        let name = match branch.name()? {
            Some(name) => name,
            None => continue,
        };
        let name = match kind {
            BranchType::Local => name,
            BranchType::Remote => match name.strip_prefix("origin/") {
                Some(name) => name,
                None => continue,
            },
        };
        if name != "HEAD" {
            names.insert(name.to_string());
        }
    }
    debug!("{} branches in {}", names.len(), path.display());
    Ok(names.into_iter().collect())
}

fn walk_branch(path: &Path, branch: &str, tx: &mpsc::Sender<Result<CommitRecord>>) -> anyhow::Result<()> {
    let repo = Repository::open(path).context("Failed to open repository")?;
    let reference = repo
        .find_reference(&format!("refs/remotes/origin/{}", branch))
        .or_else(|_| repo.find_reference(&format!("refs/heads/{}", branch)))
        .with_context(|| format!("Branch {} not found", branch))?;
    let tip = reference.peel_to_commit()?.id();

    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip)?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;

    let mut count = 0usize;
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        let record = CommitRecord {
            branch: branch.to_string(),
            hash: commit.id().to_string(),
            author: identity(&commit.author()),
            committer: identity(&commit.committer()),
            date: commit_date(&commit)?,
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            files: changed_files(&repo, &commit)?,
        };
        if tx.blocking_send(Ok(record)).is_err() {
            trace!("Traversal of {} abandoned by the reader", branch);
            return Ok(());
        }
        count += 1;
    }
    debug!("Traversed {} commits of {} in {}", count, branch, path.display());
    Ok(())
}

fn identity(signature: &Signature) -> Identity {
    Identity::new(
        String::from_utf8_lossy(signature.name_bytes()).into_owned(),
        String::from_utf8_lossy(signature.email_bytes()).into_owned(),
    )
}

fn commit_date(commit: &Commit) -> anyhow::Result<DateTime<Utc>> {
    let seconds = commit.time().seconds();
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| anyhow!("Commit {} has an invalid timestamp {}", commit.id(), seconds))
}

/// Changes against the first parent, or against the empty tree for a root commit.
fn changed_files(repo: &Repository, commit: &Commit) -> anyhow::Result<Vec<FileChange>> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parents().next() {
        Some(parent) => Some(parent.tree()?),
        None => None,
    };
    let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

    let files = diff
        .deltas()
        .filter_map(|delta| {
            let change_type = match delta.status() {
                Delta::Added | Delta::Copied => ChangeType::Added,
                Delta::Deleted => ChangeType::Deleted,
                Delta::Renamed => ChangeType::Renamed,
                Delta::Modified | Delta::Typechange => ChangeType::Modified,
                _ => return None,
            };
            let file = match change_type {
                ChangeType::Deleted => delta.old_file(),
                _ => delta.new_file(),
            };
            let path = file.path()?.to_string_lossy().into_owned();
            Some(FileChange::new(path, change_type))
        })
        .collect();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use git2::{Oid, RepositoryInitOptions, Time};
    use tempfile::TempDir;

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.\nSed do eiusmod tempor incididunt.\n";

    fn commit(
        repo: &Repository,
        refname: &str,
        parent: Option<Oid>,
        files: &[(&str, &str)],
        who: (&str, &str),
        at: i64,
    ) -> Oid {
        let mut builder = repo.treebuilder(None).unwrap();
        for (name, content) in files {
            let blob = repo.blob(content.as_bytes()).unwrap();
            builder.insert(*name, blob, 0o100644).unwrap();
        }
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let signature = Signature::new(who.0, who.1, &Time::new(at, 0)).unwrap();
        let parents: Vec<Commit> = parent.map(|oid| repo.find_commit(oid).unwrap()).into_iter().collect();
        let parents: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some(refname), &signature, &signature, "change", &tree, &parents)
            .unwrap()
    }

    /// Bare origin with `main` (add, rename, delete) and `feature` branching off the first commit.
    fn origin() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RepositoryInitOptions::new();
        options.bare(true).initial_head("main");
        let repo = Repository::init_opts(dir.path(), &options).unwrap();
        let ann = ("Ann", "ann@x.com");
        let first = commit(&repo, "refs/heads/main", None, &[("a.txt", LOREM)], ann, 1_600_000_000);
        let renamed = [("b.txt", LOREM), ("c.txt", "c\n")];
        let second = commit(&repo, "refs/heads/main", Some(first), &renamed, ann, 1_600_000_100);
        commit(&repo, "refs/heads/main", Some(second), &[("c.txt", "c\n")], ("Bob", "bob@y.com"), 1_600_000_200);
        commit(&repo, "refs/heads/feature", Some(first), &[("a.txt", "changed\n")], ann, 1_600_000_300);
        dir
    }

    fn url(dir: &TempDir) -> String {
        dir.path().display().to_string()
    }

    #[tokio::test]
    async fn clones_and_lists_branches() {
        let origin = origin();
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join("nested").join("clone");

        GitClient.clone_repo(&url(&origin), &path, false).await.unwrap();
        assert_eq!(GitClient.list_branches(&path).await.unwrap(), vec!["feature", "main"]);

        // a second clone replaces the first
        GitClient.clone_repo(&url(&origin), &path, false).await.unwrap();
        assert!(path.join(".git").exists());
    }

    #[tokio::test]
    async fn mirror_clone_is_bare_with_all_branches() {
        let origin = origin();
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join("mirror");

        GitClient.clone_repo(&url(&origin), &path, true).await.unwrap();
        assert!(Repository::open(&path).unwrap().is_bare());
        assert_eq!(GitClient.list_branches(&path).await.unwrap(), vec!["feature", "main"]);
    }

    #[tokio::test]
    async fn traverses_oldest_first_with_file_changes() {
        let origin = origin();
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join("clone");
        GitClient.clone_repo(&url(&origin), &path, false).await.unwrap();

        let commits: Vec<CommitRecord> = GitClient.traverse_commits(&path, "main").try_collect().await.unwrap();
        assert_eq!(commits.len(), 3);
        assert!(commits.windows(2).all(|pair| pair[0].date <= pair[1].date));
        assert!(commits.iter().all(|commit| commit.branch == "main"));

        assert_eq!(commits[0].files, vec![FileChange::new("a.txt".to_string(), ChangeType::Added)]);
        assert_eq!(
            commits[1].files,
            vec![
                FileChange::new("b.txt".to_string(), ChangeType::Renamed),
                FileChange::new("c.txt".to_string(), ChangeType::Added),
            ]
        );
        assert_eq!(commits[2].files, vec![FileChange::new("b.txt".to_string(), ChangeType::Deleted)]);
        assert_eq!(commits[2].author, Identity::new("Bob".to_string(), "bob@y.com".to_string()));
        assert_eq!(commits[2].message, "change");

        let feature: Vec<CommitRecord> = GitClient.traverse_commits(&path, "feature").try_collect().await.unwrap();
        assert_eq!(feature.len(), 2);
        assert_eq!(feature[0].hash, commits[0].hash);
        assert_eq!(feature[1].files[0].change_type, ChangeType::Modified);
    }

    #[tokio::test]
    async fn unknown_branch_yields_a_single_error() {
        let origin = origin();
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join("clone");
        GitClient.clone_repo(&url(&origin), &path, false).await.unwrap();

        let results: Vec<Result<CommitRecord>> = GitClient.traverse_commits(&path, "nope").collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::CloneOrTraversal { .. })));
    }

    #[tokio::test]
    async fn missing_origin_fails_to_clone() {
        let work = tempfile::tempdir().unwrap();
        let missing = work.path().join("missing").display().to_string();
        let result = GitClient.clone_repo(&missing, &work.path().join("clone"), false).await;
        assert!(matches!(result, Err(Error::CloneOrTraversal { .. })));
    }
}
