use crate::api::{CommitRecord, Identity};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;

/// How ledger keys are derived from commit emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailPolicy {
    /// Raw email string, `A@x.com` and `a@x.com` stay apart.
    #[default]
    Exact,
    /// Lower-cased email.
    FoldCase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributorEntry {
    /// Email as first seen.
    pub email: String,
    /// Display name as first seen.
    pub name: String,
    pub names: BTreeSet<String>,
    pub commit_count: u32,
    pub branches: BTreeSet<String>,
}

impl ContributorEntry {
    fn new(identity: &Identity) -> Self {
        ContributorEntry {
            email: identity.email.clone(),
            name: identity.name.clone(),
            names: BTreeSet::new(),
            commit_count: 0,
            branches: BTreeSet::new(),
        }
    }
}

impl Display for ContributorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let branches: Vec<&str> = self.branches.iter().map(String::as_str).collect();
        f.write_fmt(format_args!(
            "email: {}\tname: {}\tcommits: {}\tbranches: {}",
            self.email,
            self.name,
            self.commit_count,
            branches.join(",")
        ))
    }
}

/// Contributors keyed by email.
///
/// A contributor is counted once per distinct `(branch, commit hash)` pair in which the email shows up
/// as author or committer.
#[derive(Debug, Default)]
pub struct ContributorLedger {
    policy: EmailPolicy,
    entries: HashMap<String, ContributorEntry>,
    seen: HashSet<(String, String, String)>,
}

impl ContributorLedger {
    pub fn new(policy: EmailPolicy) -> Self {
        ContributorLedger {
            policy,
            ..Default::default()
        }
    }

    pub fn ingest(&mut self, commit: &CommitRecord) {
        self.record(&commit.author, &commit.branch, &commit.hash);
        self.record(&commit.committer, &commit.branch, &commit.hash);
    }

    /// Inserts the contributor if absent, else updates it. Returns `false` when the pair was already counted.
    pub fn record(&mut self, identity: &Identity, branch: &str, hash: &str) -> bool {
        let key = self.key(&identity.email);
        if !self.seen.insert((key.clone(), branch.to_string(), hash.to_string())) {
            return false;
        }
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| ContributorEntry::new(identity));
        entry.commit_count += 1;
        entry.branches.insert(branch.to_string());
        entry.names.insert(identity.name.clone());
        true
    }

    pub fn get(&self, email: &str) -> Option<&ContributorEntry> {
        self.entries.get(&self.key(email))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries by descending commit count, then email.
    pub fn entries(&self) -> Vec<&ContributorEntry> {
        let mut entries: Vec<&ContributorEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.commit_count.cmp(&a.commit_count).then_with(|| a.email.cmp(&b.email)));
        entries
    }

    fn key(&self, email: &str) -> String {
        match self.policy {
            EmailPolicy::Exact => email.to_string(),
            EmailPolicy::FoldCase => email.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChangeType;
    use crate::api::FileChange;
    use chrono::{TimeZone, Utc};

    fn commit(branch: &str, hash: &str, author: &str, committer: &str) -> CommitRecord {
        CommitRecord {
            branch: branch.to_string(),
            hash: hash.to_string(),
            author: Identity::new(author.split('@').next().unwrap().to_string(), author.to_string()),
            committer: Identity::new(committer.split('@').next().unwrap().to_string(), committer.to_string()),
            date: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            message: "msg".to_string(),
            files: vec![FileChange::new("README.md".to_string(), ChangeType::Modified)],
        }
    }

    fn branches(entry: &ContributorEntry) -> Vec<&str> {
        entry.branches.iter().map(String::as_str).collect()
    }

    #[test]
    fn accumulates_per_email_across_branches() {
        let mut ledger = ContributorLedger::new(EmailPolicy::Exact);
        for record in [
            commit("main", "1", "a@x.com", "a@x.com"),
            commit("main", "2", "a@x.com", "a@x.com"),
            commit("main", "3", "b@y.com", "b@y.com"),
            commit("dev", "4", "a@x.com", "a@x.com"),
        ] {
            ledger.ingest(&record);
        }

        let a = ledger.get("a@x.com").unwrap();
        assert_eq!(a.commit_count, 3);
        assert_eq!(branches(a), vec!["dev", "main"]);
        let b = ledger.get("b@y.com").unwrap();
        assert_eq!(b.commit_count, 1);
        assert_eq!(branches(b), vec!["main"]);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn author_and_committer_are_counted_independently() {
        let mut ledger = ContributorLedger::default();
        ledger.ingest(&commit("main", "1", "a@x.com", "web@github.com"));
        assert_eq!(ledger.get("a@x.com").unwrap().commit_count, 1);
        assert_eq!(ledger.get("web@github.com").unwrap().commit_count, 1);
    }

    #[test]
    fn revisiting_a_branch_commit_does_not_inflate() {
        let mut ledger = ContributorLedger::default();
        let record = commit("main", "1", "a@x.com", "a@x.com");
        ledger.ingest(&record);
        ledger.ingest(&record);
        assert_eq!(ledger.get("a@x.com").unwrap().commit_count, 1);

        // same commit reachable from a second branch is a separate pair
        ledger.ingest(&commit("dev", "1", "a@x.com", "a@x.com"));
        assert_eq!(ledger.get("a@x.com").unwrap().commit_count, 2);
    }

    #[test]
    fn same_email_merges_different_names() {
        let mut ledger = ContributorLedger::default();
        ledger.record(&Identity::new("Ann".to_string(), "a@x.com".to_string()), "main", "1");
        ledger.record(&Identity::new("Ann Smith".to_string(), "a@x.com".to_string()), "main", "2");
        let entry = ledger.get("a@x.com").unwrap();
        assert_eq!(entry.name, "Ann");
        assert_eq!(entry.names.len(), 2);
        assert_eq!(entry.commit_count, 2);
    }

    #[test]
    fn email_policy() {
        let upper = Identity::new("A".to_string(), "A@x.com".to_string());
        let lower = Identity::new("a".to_string(), "a@x.com".to_string());

        let mut exact = ContributorLedger::new(EmailPolicy::Exact);
        exact.record(&upper, "main", "1");
        exact.record(&lower, "main", "2");
        assert_eq!(exact.len(), 2);

        let mut folded = ContributorLedger::new(EmailPolicy::FoldCase);
        folded.record(&upper, "main", "1");
        folded.record(&lower, "main", "2");
        assert_eq!(folded.len(), 1);
        assert_eq!(folded.get("A@X.COM").unwrap().commit_count, 2);
    }

    #[test]
    fn entries_sorted_by_count() {
        let mut ledger = ContributorLedger::default();
        ledger.ingest(&commit("main", "1", "b@y.com", "b@y.com"));
        ledger.ingest(&commit("main", "2", "a@x.com", "a@x.com"));
        ledger.ingest(&commit("main", "3", "c@z.com", "c@z.com"));
        ledger.ingest(&commit("main", "4", "c@z.com", "c@z.com"));
        let emails: Vec<&str> = ledger.entries().iter().map(|e| e.email.as_str()).collect();
        assert_eq!(emails, vec!["c@z.com", "a@x.com", "b@y.com"]);
    }
}
