use crate::api::{display_date, CommitRecord, ForkRecord, GithubApi, RepoMetadata, RepoTarget, Result, Vcs};
use crate::expansion::{self, ExpansionMode};
use crate::ledger::{ContributorLedger, EmailPolicy};
use crate::reconciler::reconcile;
use crate::report::{EmailFinding, ReportWriter, UserReport};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL repositories are cloned from, `https://github.com`.
    pub clone_url: String,
    /// Persistent tree of full clones.
    pub clones_dir: PathBuf,
    /// Mirror clones of the expanded search, removed after each use.
    pub scratch_dir: PathBuf,
    pub email_policy: EmailPolicy,
    pub expansion: Option<ExpansionMode>,
}

impl Settings {
    /// Full clone of a listed repository, `<clones_dir>/<owner>__<repo>/repo`.
    pub fn repo_clone_dir(&self, target: &RepoTarget) -> PathBuf {
        self.clones_dir.join(target.slug()).join("repo")
    }

    /// Full clone of a fork, next to its parent's clone rather than inside its working tree.
    pub fn fork_clone_dir(&self, parent: &RepoTarget, fork: &RepoTarget) -> PathBuf {
        self.clones_dir.join(parent.slug()).join("forks").join(fork.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
enum Stage {
    FetchingMetadata,
    FetchingForks,
    TraversingRepo,
    TraversingForks,
    Reconciling,
    Reporting,
    Done,
}

#[derive(Debug)]
pub struct RepoReport {
    pub target: RepoTarget,
    /// Missing when the metadata could not be fetched.
    pub metadata: Option<RepoMetadata>,
    pub forks: Vec<ForkRecord>,
    pub skipped_forks: Vec<RepoTarget>,
    pub branch_count: Option<usize>,
    pub earliest_commit: Option<DateTime<Utc>>,
    pub ledger: ContributorLedger,
}

impl RepoReport {
    fn new(target: RepoTarget, policy: EmailPolicy) -> Self {
        RepoReport {
            target,
            metadata: None,
            forks: Vec::new(),
            skipped_forks: Vec::new(),
            branch_count: None,
            earliest_commit: None,
            ledger: ContributorLedger::new(policy),
        }
    }
}

impl Display for RepoReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "repo: {}\tforks: {}\tbranches: {}\tearliest commit: {}\tcontributors: {}",
            self.target,
            self.forks.len(),
            self.branch_count.map_or_else(|| "-".to_string(), |count| count.to_string()),
            display_date(&self.earliest_commit),
            self.ledger.len()
        ))
    }
}

/// State of one run, handed to the report emitter when done.
#[derive(Debug, Default)]
pub struct RunContext {
    pub repos: Vec<RepoReport>,
    pub users: Vec<UserReport>,
    pub contributor_logins: BTreeSet<String>,
    pub forker_logins: BTreeSet<String>,
    pub emails: Vec<EmailFinding>,
}

struct Traversal {
    branch_count: usize,
    commits: Vec<CommitRecord>,
}

pub struct Aggregator<G: GithubApi, V: Vcs> {
    github: G,
    vcs: V,
    reports: ReportWriter,
    settings: Settings,
}

impl<G: GithubApi, V: Vcs> Aggregator<G, V> {
    pub fn new(github: G, vcs: V, reports: ReportWriter, settings: Settings) -> Self {
        Aggregator {
            github,
            vcs,
            reports,
            settings,
        }
    }

    /// Processes targets one after another, then runs the expanded search if configured.
    pub async fn run(&self, targets: &[RepoTarget]) -> RunContext {
        let mut context = RunContext::default();
        for target in targets {
            let report = self.aggregate(target, &mut context).await;
            context.repos.push(report);
        }
        if let Some(mode) = &self.settings.expansion {
            let users = mode.users(&context);
            info!("Expanded search ({:?}) over {} users", mode, users.len());
            match expansion::search(&self.github, &self.vcs, &self.settings, users).await {
                Ok(findings) => {
                    if let Err(err) = self.reports.append_emails(&findings) {
                        error!("Failed to write email report: {}", err);
                    }
                    context.emails = findings;
                }
                Err(err) => error!("Expanded search failed: {}", err),
            }
        }
        context
    }

    async fn aggregate(&self, target: &RepoTarget, context: &mut RunContext) -> RepoReport {
        let mut report = RepoReport::new(target.clone(), self.settings.email_policy);

        enter(target, Stage::FetchingMetadata);
        match self.github.repo(target).await {
            Ok(metadata) => report.metadata = Some(metadata),
            Err(err) => warn!("No metadata for {}: {}", target, err),
        }

        enter(target, Stage::FetchingForks);
        let mut forks = self.github.forks(target).await.unwrap_or_else(|err| {
            warn!("No forks for {}: {}", target, err);
            Vec::new()
        });
        context
            .forker_logins
            .extend(forks.iter().map(|fork| fork.target.owner.clone()));

        enter(target, Stage::TraversingRepo);
        let path = self.settings.repo_clone_dir(target);
        let commits = match self.traverse(target, &path).await {
            Ok(traversal) => {
                report.branch_count = Some(traversal.branch_count);
                report.earliest_commit = traversal.commits.iter().map(|commit| commit.date).min();
                for commit in &traversal.commits {
                    report.ledger.ingest(commit);
                }
                Some(traversal.commits)
            }
            Err(err) => {
                error!("Skipping history of {}: {}", target, err);
                None
            }
        };

        enter(target, Stage::TraversingForks);
        for fork in forks.iter_mut() {
            let path = self.settings.fork_clone_dir(target, &fork.target);
            match self.traverse(&fork.target, &path).await {
                Ok(traversal) => {
                    fork.branch_count = Some(traversal.branch_count);
                    for commit in &traversal.commits {
                        report.ledger.ingest(commit);
                    }
                    if let Err(err) = self.reports.write_fork(target, fork, &traversal.commits) {
                        error!("Failed to write report of fork {}: {}", fork.target, err);
                    }
                }
                Err(err) => {
                    error!("Skipping fork {}: {}", fork.target, err);
                    report.skipped_forks.push(fork.target.clone());
                }
            }
        }
        report.forks = forks;

        enter(target, Stage::Reconciling);
        let users = self.reconcile(target, context).await;

        enter(target, Stage::Reporting);
        if let Some(commits) = &commits {
            match self.reports.write_repo(target, commits) {
                Ok(path) => info!("Wrote {}", path.display()),
                Err(err) => error!("Failed to write report of {}: {}", target, err),
            }
        }
        if let Err(err) = self.reports.append_users(&users) {
            error!("Failed to write users of {}: {}", target, err);
        }
        context.users.extend(users);

        enter(target, Stage::Done);
        report
    }

    /// Clones `target` and walks every branch once. The ledger is left to the caller so a failed
    /// traversal leaves no partial counts.
    async fn traverse(&self, target: &RepoTarget, path: &Path) -> Result<Traversal> {
        let url = target.clone_url(&self.settings.clone_url);
        info!("Cloning {} into {}", url, path.display());
        self.vcs.clone_repo(&url, path, false).await?;
        let branches = self.vcs.list_branches(path).await?;
        let mut commits = Vec::new();
        for branch in &branches {
            let before = commits.len();
            let mut stream = self.vcs.traverse_commits(path, branch);
            while let Some(commit) = stream.next().await {
                commits.push(commit?);
            }
            debug!("{} {}: {} commits", target, branch, commits.len() - before);
        }
        Ok(Traversal {
            branch_count: branches.len(),
            commits,
        })
    }

    async fn reconcile(&self, target: &RepoTarget, context: &mut RunContext) -> Vec<UserReport> {
        let contributors = self.github.contributors(target).await.unwrap_or_else(|err| {
            warn!("No contributors for {}: {}", target, err);
            Vec::new()
        });
        if contributors.is_empty() {
            return Vec::new();
        }
        context
            .contributor_logins
            .extend(contributors.iter().map(|contributor| contributor.login.clone()));
        let commits = self.github.commits(target).await.unwrap_or_else(|err| {
            warn!("No API commits for {}, profiles stay as published: {}", target, err);
            Vec::new()
        });

        let mut users = Vec::with_capacity(contributors.len());
        for contributor in contributors {
            match self.github.user(&contributor.login).await {
                Ok(profile) => users.push(UserReport {
                    repo: target.clone(),
                    profile: reconcile(profile, &commits),
                    contributions: contributor.contributions,
                }),
                Err(err) => warn!("No profile for {}: {}", contributor.login, err),
            }
        }
        users
    }
}

fn enter(target: &RepoTarget, stage: Stage) {
    debug!("{}: {}", target, stage);
}
