use chrono::{DateTime, Utc};
use gitsearch::api::{ApiCommit, ForkRecord, Identity, RepoMetadata, RepoTarget, UserProfile};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Repo {
    pub name: String,
    pub owner: Account,
    pub html_url: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub stargazers_count: u32,
    pub default_branch: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Account {
    pub login: String,
}

impl From<&Repo> for RepoTarget {
    fn from(repo: &Repo) -> Self {
        RepoTarget::new(repo.owner.login.clone(), repo.name.clone())
    }
}

impl From<Repo> for RepoMetadata {
    fn from(repo: Repo) -> Self {
        RepoMetadata {
            target: RepoTarget::from(&repo),
            url: repo.html_url,
            description: repo.description,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pushed_at: repo.pushed_at,
            forks_count: repo.forks_count,
            stargazers_count: repo.stargazers_count,
            default_branch: repo.default_branch,
        }
    }
}

impl From<Repo> for ForkRecord {
    fn from(repo: Repo) -> Self {
        ForkRecord {
            target: RepoTarget::from(&repo),
            url: repo.html_url,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pushed_at: repo.pushed_at,
            branch_count: None,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Contributor {
    pub login: String,
    pub contributions: u32,
}

impl From<Contributor> for gitsearch::api::Contributor {
    fn from(contributor: Contributor) -> Self {
        gitsearch::api::Contributor::new(contributor.login, contributor.contributions)
    }
}

#[derive(Deserialize, Debug)]
pub struct User {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub bio: Option<String>,
    pub twitter_username: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            login: user.login,
            name: user.name,
            email: user.email,
            location: user.location,
            company: user.company,
            // the API reports an unset blog as ""
            website: user.blog.filter(|blog| !blog.is_empty()),
            bio: user.bio,
            twitter: user.twitter_username,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
    pub author: Option<Account>,
    pub committer: Option<Account>,
}

#[derive(Deserialize, Debug)]
pub struct CommitDetail {
    pub author: Option<GitIdentity>,
    pub committer: Option<GitIdentity>,
}

#[derive(Deserialize, Debug)]
pub struct GitIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<GitIdentity> for Identity {
    fn from(identity: GitIdentity) -> Self {
        Identity::new(identity.name.unwrap_or_default(), identity.email.unwrap_or_default())
    }
}

impl From<Commit> for ApiCommit {
    fn from(commit: Commit) -> Self {
        ApiCommit {
            sha: commit.sha,
            author_login: commit.author.map(|account| account.login),
            committer_login: commit.committer.map(|account| account.login),
            author: commit.commit.author.map(Identity::from).unwrap_or_default(),
            committer: commit.commit.committer.map(Identity::from).unwrap_or_default(),
        }
    }
}
