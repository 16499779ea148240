use clap::Parser;
use gitsearch::{CombineMode, EmailPolicy, ExpansionMode};
use secrecy::SecretString;
use std::{
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
pub struct Args {
    /// Repository URLs, or a single file listing one URL per line
    #[clap(required = true)]
    pub targets: Vec<String>,

    /// API OAuth access tokens, used in order as rate limits are hit
    #[clap(long = "token", env = "GITHUB_TOKENS", use_value_delimiter = true)]
    pub tokens: Vec<SecretString>,

    /// Repository API URL
    #[clap(long, env, default_value = "https://api.github.com")]
    pub api_url: String,

    /// Base URL repositories are cloned from
    #[clap(long, env, default_value = "https://github.com")]
    pub clone_url: String,

    /// Directory CSV reports are written to
    #[clap(long, env, default_value = "reports")]
    pub reports_dir: PathBuf,

    /// Directory of persistent clones
    #[clap(long, env, default_value = "clones")]
    pub clones_dir: PathBuf,

    /// Directory of the short-lived mirror clones of the expanded search
    #[clap(long, env, default_value = "scratch")]
    pub scratch_dir: PathBuf,

    /// Items requested per API page
    #[clap(long, env, default_value_t = 100, parse(try_from_str=per_page_in_range))]
    pub per_page: u32,

    /// Count emails differing only in case as one contributor
    #[clap(long)]
    pub fold_email_case: bool,

    /// Also append every commit row to all.csv
    #[clap(long, group = "combine")]
    pub combineall: bool,

    /// Also append commit rows of the listed repositories to all_repo.csv
    #[clap(long, group = "combine")]
    pub combinerepo: bool,

    /// Also append commit rows of forks to all_forks.csv of their repository
    #[clap(long, group = "combine")]
    pub combinefork: bool,

    /// Search emails in repositories of every contributor and forker
    #[clap(long, group = "expand")]
    pub expandedsearch: bool,

    /// Search emails in repositories of contributors
    #[clap(long, group = "expand")]
    pub escontributors: bool,

    /// Search emails in repositories of forkers
    #[clap(long, group = "expand")]
    pub esforkers: bool,

    /// Search emails in repositories of the given user
    #[clap(long, group = "expand")]
    pub esuser: Option<String>,
}

impl Args {
    pub fn combine_mode(&self) -> Option<CombineMode> {
        match (self.combineall, self.combinerepo, self.combinefork) {
            (true, _, _) => Some(CombineMode::All),
            (_, true, _) => Some(CombineMode::Repo),
            (_, _, true) => Some(CombineMode::Fork),
            _ => None,
        }
    }

    pub fn expansion_mode(&self) -> Option<ExpansionMode> {
        if let Some(user) = &self.esuser {
            return Some(ExpansionMode::User(user.clone()));
        }
        match (self.expandedsearch, self.escontributors, self.esforkers) {
            (true, _, _) => Some(ExpansionMode::Everyone),
            (_, true, _) => Some(ExpansionMode::Contributors),
            (_, _, true) => Some(ExpansionMode::Forkers),
            _ => None,
        }
    }

    pub fn email_policy(&self) -> EmailPolicy {
        if self.fold_email_case {
            EmailPolicy::FoldCase
        } else {
            EmailPolicy::Exact
        }
    }
}

fn per_page_in_range(value: &str) -> clap::Result<u32, String> {
    number_in_range(value, 1, 100, "per_page".to_string())
}

fn number_in_range<T>(value: &str, min: T, max: T, name: String) -> clap::Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    <T as FromStr>::Err: Display,
{
    value.parse::<T>().map_err(|err| format!("{}", err)).and_then(|value| {
        if value < min || value > max {
            return Err(format!("{} is not in range {} .. {}.", name, min, max));
        }
        Ok(value)
    })
}
