//! Fills gaps of GitHub user profiles with identities mined from commit history.

use crate::api::{ApiCommit, UserProfile};
use std::collections::BTreeSet;

/// Identities seen on commits attributed to one user.
#[derive(Debug, Default, PartialEq)]
pub struct Reconciled {
    pub emails: BTreeSet<String>,
    pub names: BTreeSet<String>,
}

/// Collects identities of commits whose author or committer login is `login`, or whose author name is
/// either `login` or `display_name`.
pub fn matching_identities(login: &str, display_name: Option<&str>, commits: &[ApiCommit]) -> Reconciled {
    let mut reconciled = Reconciled::default();
    let display_name = display_name.filter(|name| !name.is_empty());
    for commit in commits {
        let author_login = is_login(commit.author_login.as_deref(), login);
        let committer_login = is_login(commit.committer_login.as_deref(), login);
        let author_name = commit.author.name == login || Some(commit.author.name.as_str()) == display_name;

        if author_login || author_name {
            reconciled.insert(&commit.author.name, &commit.author.email);
        }
        if committer_login {
            reconciled.insert(&commit.committer.name, &commit.committer.email);
        }
    }
    reconciled
}

impl Reconciled {
    fn insert(&mut self, name: &str, email: &str) {
        if !email.is_empty() {
            self.emails.insert(email.to_string());
        }
        if !name.is_empty() {
            self.names.insert(name.to_string());
        }
    }
}

fn is_login(candidate: Option<&str>, login: &str) -> bool {
    candidate.map_or(false, |candidate| candidate.eq_ignore_ascii_case(login))
}

/// Fills an empty profile email or name from commit history. Known profile values always win.
pub fn reconcile(mut profile: UserProfile, commits: &[ApiCommit]) -> UserProfile {
    let reconciled = matching_identities(&profile.login, profile.name.as_deref(), commits);
    if is_blank(&profile.email) {
        profile.email = joined(&reconciled.emails).or(profile.email);
    }
    if is_blank(&profile.name) {
        profile.name = joined(&reconciled.names).or(profile.name);
    }
    profile
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |value| value.trim().is_empty())
}

fn joined(values: &BTreeSet<String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}
