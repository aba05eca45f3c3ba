use anyhow::{Context, Result};

use crate::github::api::{GithubApi, GithubIssueStore};
use crate::skills::search::SkillsSearch;
use crate::tracking::store::IssueStore;
use crate::tracking::{aggregate, collector, comment, config, ledger, record, summary};

/// The scheduled weekly cycle: collect, publish the per-week comment,
/// re-scan the thread, and refresh the aggregate block in the issue body.
/// A `partial` data status still exits 0; only fatal errors propagate.
pub fn run() -> Result<()> {
    let cfg = config::load_config()?;
    let target = config::load_issue_target()?;
    let actions = config::load_actions_context();

    let api = GithubApi::new(&target.token)?;
    let search = SkillsSearch::new(&cfg.search_base_url)?;
    let started_at = record::now_utc();

    let observation = collector::collect_observations(&cfg, &search);
    let repo_stats = collector::collect_repo_stats(&api, &target.repo, config::RELEASE_TAG)?;
    let run_record = record::build_run_record(&cfg, started_at, observation.results, repo_stats);

    let mut store = GithubIssueStore::new(&api, &target.repo, target.issue_number);
    let body = comment::render_weekly_comment(
        &run_record,
        &observation.raw_by_query,
        cfg.raw_chars_limit,
        &actions,
    )?;
    comment::publish_run(&mut store, &run_record, &body)?;

    // Re-scan so the aggregate includes the comment just written.
    let comments = store
        .list_comments()
        .context("re-listing issue comments failed")?;
    let recovered = ledger::recover_ledger(&comments);
    let summary_block = aggregate::render_aggregate(&cfg.queries, &recovered);

    let current_body = store.issue_body().context("reading issue body failed")?;
    let next_body = summary::upsert_summary_block(&current_body, &summary_block);
    if next_body != current_body {
        store
            .set_issue_body(&next_body)
            .context("writing issue body failed")?;
    }

    summary::append_step_summary(&actions, &target.repo, target.issue_number, &run_record)?;
    println!(
        "tracking updated: issue #{} ({})",
        target.issue_number, run_record.status
    );
    Ok(())
}
