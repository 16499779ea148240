mod args;

pub use args::Args;

use git_client::GitClient;
use github_client::GithubClientBuilder;
use gitsearch::api::Result;
use gitsearch::{read_targets, Aggregator, ReportWriter, RunContext, Settings};
use log::info;
use std::io::Write;

pub async fn run(args: Args) -> Result<RunContext> {
    let targets = read_targets(&args.targets)?;
    info!("{} repositories to process", targets.len());

    let github = GithubClientBuilder::default()
        .with_github_url(&args.api_url)
        .with_tokens(args.tokens.clone())
        .with_per_page(args.per_page)
        .build()?;

    let reports = ReportWriter::new(&args.reports_dir, args.combine_mode());
    let settings = Settings {
        clone_url: args.clone_url.clone(),
        clones_dir: args.clones_dir.clone(),
        scratch_dir: args.scratch_dir.clone(),
        email_policy: args.email_policy(),
        expansion: args.expansion_mode(),
    };

    let aggregator = Aggregator::new(github, GitClient::default(), reports, settings);
    Ok(aggregator.run(&targets).await)
}

/// Console summary: each repository, its forks and its contributors, then the expanded search findings.
pub fn write_summary<W: Write>(context: &RunContext, out: &mut W) -> std::io::Result<()> {
    for report in &context.repos {
        writeln!(out, "{}", report)?;
        for fork in &report.forks {
            writeln!(out, "  {}", fork)?;
        }
        for entry in report.ledger.entries() {
            writeln!(out, "  {}", entry)?;
        }
    }
    for finding in &context.emails {
        writeln!(out, "{}\t{}\t{}", finding.username, finding.repo, finding.emails.join(", "))?;
    }
    Ok(())
}
