use std::collections::BTreeMap;

use crate::tracking::ledger::LedgerEntry;
use crate::tracking::record::QueryResult;

/// Records feeding the trend deltas: the latest run plus up to three before it.
const TREND_WINDOW: usize = 4;
/// Rows shown in the recent-runs history table.
const RECENT_RUNS_CAP: usize = 12;

fn signed_delta(early: Option<i64>, late: Option<i64>) -> String {
    match (early, late) {
        (Some(early), Some(late)) => format!("{:+}", late - early),
        _ => "n/a".to_string(),
    }
}

fn note_for(row: Option<&QueryResult>) -> &'static str {
    match row {
        Some(row) if row.error.is_some() => "error",
        Some(row) if row.found => "ok",
        _ => "not found in top N",
    }
}

fn query_map(rows: &[QueryResult]) -> BTreeMap<&str, &QueryResult> {
    rows.iter().map(|row| (row.query.as_str(), row)).collect()
}

/// Render the aggregate view from the recovered ledger. Deterministic: the
/// ledger is normalized by (timestamp, comment id) before any computation,
/// so any permutation of the comment listing produces identical output.
pub fn render_aggregate(queries: &[String], ledger: &[LedgerEntry]) -> String {
    if ledger.is_empty() {
        return "No tracking runs found yet.".to_string();
    }

    let mut entries: Vec<&LedgerEntry> = ledger.iter().collect();
    entries.sort_by(|a, b| {
        (a.record.timestamp_utc.as_str(), a.comment.id)
            .cmp(&(b.record.timestamp_utc.as_str(), b.comment.id))
    });

    let Some(latest) = entries.last() else {
        return "No tracking runs found yet.".to_string();
    };
    let latest_map = query_map(&latest.record.queries);

    let window_start = entries.len().saturating_sub(TREND_WINDOW);
    let recent = &entries[window_start..];
    let Some(earliest_recent) = recent.first() else {
        return "No tracking runs found yet.".to_string();
    };
    let earliest_map = query_map(&earliest_recent.record.queries);

    let mut lines: Vec<String> = Vec::new();
    lines.push("### Aggregated tracking view".to_string());
    lines.push(format!("- Latest run (UTC): `{}`", latest.record.timestamp_utc));
    lines.push(format!("- Latest run week: `{}`", latest.record.week_key));
    lines.push(format!("- Latest run status: `{}`", latest.record.status));
    lines.push(String::new());

    lines.push("#### Latest query snapshot".to_string());
    lines.push(String::new());
    lines.push("| query | found | rank | installs | note |".to_string());
    lines.push("| --- | --- | --- | --- | --- |".to_string());
    for query in queries {
        let row = latest_map.get(query.as_str()).copied();
        let found = if row.is_some_and(|r| r.found) { "yes" } else { "no" };
        let rank = row
            .and_then(|r| r.rank)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let installs = row
            .and_then(|r| r.installs)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!(
            "| `{query}` | {found} | {rank} | {installs} | {} |",
            note_for(row)
        ));
    }
    lines.push(String::new());

    lines.push("#### 4-week trend".to_string());
    lines.push(String::new());
    lines.push("| query | rank delta | installs delta |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    for query in queries {
        let early = earliest_map.get(query.as_str()).copied();
        let late = latest_map.get(query.as_str()).copied();
        let rank_delta = signed_delta(
            early.and_then(|r| r.rank).map(i64::from),
            late.and_then(|r| r.rank).map(i64::from),
        );
        let installs_delta = signed_delta(
            early.and_then(|r| r.installs),
            late.and_then(|r| r.installs),
        );
        lines.push(format!("| `{query}` | {rank_delta} | {installs_delta} |"));
    }
    lines.push(String::new());

    lines.push("#### Recent runs".to_string());
    lines.push(String::new());
    lines.push("| week | status | timestamp | comment |".to_string());
    lines.push("| --- | --- | --- | --- |".to_string());
    let history_start = entries.len().saturating_sub(RECENT_RUNS_CAP);
    for entry in entries[history_start..].iter().rev() {
        let comment_md = if entry.comment.html_url.is_empty() {
            "n/a".to_string()
        } else {
            format!("[link]({})", entry.comment.html_url)
        };
        lines.push(format!(
            "| `{}` | {} | `{}` | {comment_md} |",
            entry.record.week_key, entry.record.status, entry.record.timestamp_utc
        ));
    }

    let latest_errors = latest.record.errors.len();
    let missing: Vec<&str> = latest
        .record
        .queries
        .iter()
        .filter(|row| !row.found)
        .map(|row| row.query.as_str())
        .collect();
    lines.push(String::new());
    lines.push("#### Warnings".to_string());
    lines.push(String::new());
    if latest_errors > 0 {
        lines.push(format!(
            "- Latest run had `{latest_errors}` query/API error(s)."
        ));
    }
    if !missing.is_empty() {
        let listed: Vec<String> = missing.iter().map(|q| format!("`{q}`")).collect();
        lines.push(format!("- Not found in top-N for: {}", listed.join(", ")));
    }
    if latest_errors == 0 && missing.is_empty() {
        lines.push("- None.".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::config::TrackingConfig;
    use crate::tracking::ledger::CommentRef;
    use crate::tracking::record::{
        QueryResult, ReleaseInfo, RepoStats, RunRecord, build_run_record,
    };
    use chrono::{TimeZone, Utc};

    fn stats() -> RepoStats {
        RepoStats {
            stars: Some(2),
            forks: Some(0),
            watchers: Some(2),
            release_v0_1_0: ReleaseInfo {
                exists: false,
                url: None,
                published_at: None,
            },
        }
    }

    fn row(query: &str, rank: Option<u32>, installs: Option<i64>) -> QueryResult {
        QueryResult {
            query: query.to_string(),
            found: rank.is_some(),
            rank,
            installs,
            skill_id: None,
            source: None,
            error: None,
        }
    }

    fn entry(id: u64, day: u32, rows: Vec<QueryResult>) -> LedgerEntry {
        let cfg = TrackingConfig {
            queries: rows.iter().map(|r| r.query.clone()).collect(),
            ..TrackingConfig::default()
        };
        let instant = Utc.with_ymd_and_hms(2026, 4, day, 6, 0, 0).unwrap();
        let record: RunRecord = build_run_record(&cfg, instant, rows, stats());
        LedgerEntry {
            record,
            comment: CommentRef {
                id,
                html_url: format!("https://example.invalid/comments/{id}"),
            },
        }
    }

    fn queries(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_ledger_renders_placeholder() {
        assert_eq!(
            render_aggregate(&queries(&["atomic"]), &[]),
            "No tracking runs found yet."
        );
    }

    #[test]
    fn rank_delta_is_signed_difference_of_window_endpoints() {
        let ledger = vec![
            entry(1, 1, vec![row("atomic", Some(5), Some(10))]),
            entry(2, 8, vec![row("atomic", Some(4), Some(12))]),
            entry(3, 15, vec![row("atomic", Some(2), Some(30))]),
        ];
        let out = render_aggregate(&queries(&["atomic"]), &ledger);
        assert!(out.contains("| `atomic` | -3 | +20 |"), "got:\n{out}");
    }

    #[test]
    fn delta_is_not_applicable_when_an_endpoint_is_absent() {
        let ledger = vec![
            entry(1, 1, vec![row("atomic", None, None)]),
            entry(2, 8, vec![row("atomic", Some(2), Some(30))]),
        ];
        let out = render_aggregate(&queries(&["atomic"]), &ledger);
        assert!(out.contains("| `atomic` | n/a | n/a |"), "got:\n{out}");
    }

    #[test]
    fn trend_window_is_bounded_to_four_runs() {
        // Five runs; the window endpoint must be run 2, not run 1.
        let ledger = vec![
            entry(1, 1, vec![row("atomic", Some(50), None)]),
            entry(2, 2, vec![row("atomic", Some(10), None)]),
            entry(3, 3, vec![row("atomic", Some(9), None)]),
            entry(4, 4, vec![row("atomic", Some(8), None)]),
            entry(5, 5, vec![row("atomic", Some(7), None)]),
        ];
        let out = render_aggregate(&queries(&["atomic"]), &ledger);
        assert!(out.contains("| `atomic` | -3 | n/a |"), "got:\n{out}");
    }

    #[test]
    fn output_is_identical_for_any_ledger_permutation() {
        let ledger = vec![
            entry(1, 1, vec![row("atomic", Some(5), Some(10))]),
            entry(2, 8, vec![row("atomic", Some(4), Some(12))]),
            entry(3, 15, vec![row("atomic", Some(2), Some(30))]),
        ];
        let canonical = queries(&["atomic"]);
        let baseline = render_aggregate(&canonical, &ledger);

        let mut reversed = ledger.clone();
        reversed.reverse();
        assert_eq!(render_aggregate(&canonical, &reversed), baseline);

        let rotated = vec![ledger[1].clone(), ledger[2].clone(), ledger[0].clone()];
        assert_eq!(render_aggregate(&canonical, &rotated), baseline);
    }

    #[test]
    fn history_is_capped_and_most_recent_first() {
        let ledger: Vec<LedgerEntry> = (1..=14)
            .map(|day| entry(day as u64, day, vec![row("atomic", Some(1), Some(1))]))
            .collect();
        let out = render_aggregate(&queries(&["atomic"]), &ledger);

        let history_rows = out
            .lines()
            .filter(|line| line.contains("[link]("))
            .count();
        assert_eq!(history_rows, 12);

        // Day 14 is listed before day 13; days 1-2 fall off the table.
        let pos_14 = out.find("comments/14").expect("day 14 listed");
        let pos_13 = out.find("comments/13").expect("day 13 listed");
        assert!(pos_14 < pos_13);
        assert!(!out.contains("comments/2)"));
        assert!(!out.contains("`2026-04-01T"));
    }

    #[test]
    fn warnings_list_errors_and_missing_queries() {
        let rows = vec![
            row("atomic", Some(1), Some(5)),
            QueryResult::failed("mutex", "boom"),
            row("lockless", None, None),
        ];
        let ledger = vec![entry(1, 1, rows)];
        let out = render_aggregate(&queries(&["atomic", "mutex", "lockless"]), &ledger);

        assert!(out.contains("- Latest run had `1` query/API error(s)."));
        assert!(out.contains("- Not found in top-N for: `mutex`, `lockless`"));

        let clean = vec![entry(2, 8, vec![row("atomic", Some(1), Some(5))])];
        let out = render_aggregate(&queries(&["atomic"]), &clean);
        assert!(out.contains("- None."));
    }

    #[test]
    fn snapshot_marks_queries_absent_from_the_latest_run() {
        let ledger = vec![entry(1, 1, vec![row("atomic", Some(1), Some(5))])];
        let out = render_aggregate(&queries(&["atomic", "hazard pointers"]), &ledger);
        assert!(out.contains("| `hazard pointers` | no | N/A | N/A | not found in top N |"));
    }
}
