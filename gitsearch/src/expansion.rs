use crate::aggregator::{RunContext, Settings};
use crate::api::{CommitRecord, Error, GithubApi, RepoTarget, Result, Vcs};
use crate::report::EmailFinding;
use futures::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;

const NOREPLY_DOMAIN: &str = "users.noreply.github.com";

/// Whose repositories an expanded search scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionMode {
    /// Every discovered contributor and forker.
    Everyone,
    Contributors,
    Forkers,
    User(String),
}

impl ExpansionMode {
    pub fn users(&self, context: &RunContext) -> BTreeSet<String> {
        match self {
            ExpansionMode::Everyone => context
                .contributor_logins
                .union(&context.forker_logins)
                .cloned()
                .collect(),
            ExpansionMode::Contributors => context.contributor_logins.clone(),
            ExpansionMode::Forkers => context.forker_logins.clone(),
            ExpansionMode::User(user) => BTreeSet::from([user.clone()]),
        }
    }
}

pub struct EmailExtractor {
    pattern: Regex,
}

impl EmailExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}")
            .map_err(anyhow::Error::from)?;
        Ok(EmailExtractor { pattern })
    }

    /// Lower-cased email-like tokens of `text`, GitHub noreply addresses excluded.
    pub fn extract<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        self.pattern
            .find_iter(text)
            .map(|found| found.as_str().to_lowercase())
            .filter(|email| !email.ends_with(NOREPLY_DOMAIN))
    }

    pub fn from_commit(&self, commit: &CommitRecord) -> BTreeSet<String> {
        [
            &commit.author.email,
            &commit.author.name,
            &commit.committer.email,
            &commit.committer.name,
        ]
        .into_iter()
        .flat_map(|field| self.extract(field))
        .collect()
    }
}

/// Mirror-clones every repository of `users` and collects emails not reported before in this run.
pub(crate) async fn search<G: GithubApi, V: Vcs>(
    github: &G,
    vcs: &V,
    settings: &Settings,
    users: BTreeSet<String>,
) -> Result<Vec<EmailFinding>> {
    let extractor = EmailExtractor::new()?;
    let mut seen = BTreeSet::new();
    let mut findings = Vec::new();
    for user in users {
        let repos = match github.user_repos(&user).await {
            Ok(repos) => repos,
            Err(err) => {
                warn!("Skipping repositories of {}: {}", user, err);
                continue;
            }
        };
        info!("Expanded search over {} repositories of {}", repos.len(), user);
        for repo in repos {
            let scratch = settings.scratch_dir.join(repo.slug());
            let scanned = scan(vcs, &extractor, &repo.clone_url(&settings.clone_url), &scratch).await;
            if let Err(err) = remove_scratch(&scratch) {
                error!("{}", err);
            }
            let emails = match scanned {
                Ok(emails) => emails,
                Err(err) => {
                    error!("Skipping {}: {}", repo, err);
                    continue;
                }
            };
            let fresh: Vec<String> = emails.into_iter().filter(|email| seen.insert(email.clone())).collect();
            debug!("{} new emails in {}", fresh.len(), repo);
            if !fresh.is_empty() {
                findings.push(EmailFinding {
                    username: user.clone(),
                    repo,
                    emails: fresh,
                });
            }
        }
    }
    Ok(findings)
}

async fn scan<V: Vcs>(vcs: &V, extractor: &EmailExtractor, url: &str, path: &Path) -> Result<BTreeSet<String>> {
    vcs.clone_repo(url, path, true).await?;
    let mut emails = BTreeSet::new();
    for branch in vcs.list_branches(path).await? {
        let mut commits = vcs.traverse_commits(path, &branch);
        while let Some(commit) = commits.next().await {
            emails.extend(extractor.from_commit(&commit?));
        }
    }
    Ok(emails)
}

pub(crate) fn remove_scratch(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::FilesystemPermission {
            path: path.to_path_buf(),
            source,
        }),
    }
}
