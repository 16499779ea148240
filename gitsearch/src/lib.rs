//! Contributor reconnaissance over GitHub repositories
//!
//! # Overview
//!
//! Given a list of GitHub repositories, the library walks every repository and each of its forks:
//! repository metadata and the fork list come from the GitHub REST API, then every repository is cloned
//! and the full history of each of its branches is replayed.
//! Every commit updates a contributor ledger keyed by email, counting commits and recording the branches
//! an identity touched, and is written as CSV rows scoped to the repository or fork.
//! GitHub user profiles of the repository contributors are then reconciled with identities seen on
//! commits, so a profile without a public email gets the addresses its commits were made with.
//!
//! An optional expanded search mirror-clones every repository owned by discovered contributors, forkers
//! or one named user and extracts email addresses from the commit identities.
//!
//! Processing is strictly sequential. Failures are downgraded to log entries at repository or fork
//! granularity, so a batch completes for every repository it can.

pub mod api;
mod target;

#[cfg(feature = "aggregator")]
mod aggregator;
#[cfg(feature = "aggregator")]
mod expansion;
#[cfg(feature = "aggregator")]
mod ledger;
#[cfg(feature = "aggregator")]
mod reconciler;
#[cfg(feature = "aggregator")]
mod report;

pub use target::read_targets;

#[cfg(feature = "aggregator")]
pub use aggregator::{Aggregator, RepoReport, RunContext, Settings};
#[cfg(feature = "aggregator")]
pub use expansion::{EmailExtractor, ExpansionMode};
#[cfg(feature = "aggregator")]
pub use ledger::{ContributorEntry, ContributorLedger, EmailPolicy};
#[cfg(feature = "aggregator")]
pub use reconciler::{matching_identities, reconcile, Reconciled};
#[cfg(feature = "aggregator")]
pub use report::{CombineMode, EmailFinding, ReportWriter, UserReport};
