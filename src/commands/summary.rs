use anyhow::{Context, Result};

use crate::commands::CommandReport;
use crate::github::api::{GithubApi, GithubIssueStore};
use crate::tracking::store::IssueStore;
use crate::tracking::{aggregate, config, ledger};

/// Read-only preview: recover the ledger from the tracking issue and print
/// the aggregate block that the next `run` would embed. Writes nothing.
pub fn run() -> Result<CommandReport> {
    let cfg = config::load_config()?;
    let target = config::load_issue_target()?;
    let api = GithubApi::new(&target.token)?;
    let store = GithubIssueStore::new(&api, &target.repo, target.issue_number);

    let comments = store
        .list_comments()
        .context("listing issue comments failed")?;
    let recovered = ledger::recover_ledger(&comments);
    let block = aggregate::render_aggregate(&cfg.queries, &recovered);

    println!("{block}");
    println!();

    let mut report = CommandReport::new("summary");
    report.detail(format!("issue=#{}", target.issue_number));
    report.detail(format!("comments={}", comments.len()));
    report.detail(format!("recovered_runs={}", recovered.len()));
    let skipped = comments.len() - recovered.len();
    if skipped > 0 {
        report.detail(format!("skipped_comments={skipped}"));
    }
    Ok(report)
}
