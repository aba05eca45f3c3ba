use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;

use crate::tracking::config::ActionsContext;
use crate::tracking::record::RunRecord;

pub const SUMMARY_START: &str = "<!-- tracking-summary:start -->";
pub const SUMMARY_END: &str = "<!-- tracking-summary:end -->";

/// Replace the delimited summary region of the issue body, leaving every
/// byte outside the region untouched. Without markers the block is appended,
/// separated by a blank line.
pub fn upsert_summary_block(issue_body: &str, summary: &str) -> String {
    let block = format!("{SUMMARY_START}\n{summary}\n{SUMMARY_END}");

    if let Some(start) = issue_body.find(SUMMARY_START)
        && let Some(end_offset) = issue_body[start..].find(SUMMARY_END)
    {
        let end = start + end_offset + SUMMARY_END.len();
        return format!("{}{block}{}", &issue_body[..start], &issue_body[end..]);
    }

    let suffix = if !issue_body.is_empty() && !issue_body.ends_with('\n') {
        "\n\n"
    } else {
        "\n"
    };
    format!("{issue_body}{suffix}{block}\n")
}

fn step_summary_lines(repo: &str, issue_number: u64, record: &RunRecord) -> Vec<String> {
    vec![
        "## Tracking run".to_string(),
        format!("- Repository: `{repo}`"),
        format!("- Issue: #{issue_number}"),
        format!("- Week: `{}`", record.week_key),
        format!("- Status: `{}`", record.status),
        format!("- Timestamp (UTC): `{}`", record.timestamp_utc),
    ]
}

/// Append a short digest to the Actions step summary file. A missing
/// `GITHUB_STEP_SUMMARY` means we are not running under Actions; that is
/// not an error.
pub fn append_step_summary(
    actions: &ActionsContext,
    repo: &str,
    issue_number: u64,
    record: &RunRecord,
) -> Result<()> {
    let Some(path) = &actions.step_summary_path else {
        return Ok(());
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open step summary file {path}"))?;
    let mut text = step_summary_lines(repo, issue_number, record).join("\n");
    text.push('\n');
    file.write_all(text.as_bytes())
        .with_context(|| format!("failed to write step summary file {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::config::TrackingConfig;
    use crate::tracking::record::{ReleaseInfo, RepoStats, build_run_record};
    use chrono::{TimeZone, Utc};

    #[test]
    fn replaces_only_the_delimited_region() {
        let body = format!("A\n{SUMMARY_START}\nOLD\n{SUMMARY_END}\nB");
        let got = upsert_summary_block(&body, "NEW");
        assert_eq!(got, format!("A\n{SUMMARY_START}\nNEW\n{SUMMARY_END}\nB"));
    }

    #[test]
    fn replacement_is_idempotent_for_identical_summaries() {
        let body = format!("intro\n{SUMMARY_START}\nOLD\n{SUMMARY_END}\noutro");
        let once = upsert_summary_block(&body, "SAME");
        let twice = upsert_summary_block(&once, "SAME");
        assert_eq!(once, twice);
    }

    #[test]
    fn appends_with_blank_line_when_markers_are_absent() {
        let got = upsert_summary_block("existing text", "NEW");
        assert_eq!(
            got,
            format!("existing text\n\n{SUMMARY_START}\nNEW\n{SUMMARY_END}\n")
        );
    }

    #[test]
    fn appends_without_extra_blank_line_to_empty_body() {
        let got = upsert_summary_block("", "NEW");
        assert_eq!(got, format!("\n{SUMMARY_START}\nNEW\n{SUMMARY_END}\n"));
    }

    #[test]
    fn stray_end_marker_without_start_appends_instead() {
        let body = format!("text\n{SUMMARY_END}\nmore");
        let got = upsert_summary_block(&body, "NEW");
        assert!(got.starts_with(&body));
        assert!(got.ends_with(&format!("{SUMMARY_START}\nNEW\n{SUMMARY_END}\n")));
    }

    #[test]
    fn step_summary_digest_names_week_and_status() {
        let cfg = TrackingConfig::default();
        let instant = Utc.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).unwrap();
        let record = build_run_record(
            &cfg,
            instant,
            vec![],
            RepoStats {
                stars: None,
                forks: None,
                watchers: None,
                release_v0_1_0: ReleaseInfo {
                    exists: false,
                    url: None,
                    published_at: None,
                },
            },
        );
        let lines = step_summary_lines("owner/repo", 7, &record);
        assert_eq!(lines[0], "## Tracking run");
        assert!(lines.contains(&"- Issue: #7".to_string()));
        assert!(lines.contains(&format!("- Week: `{}`", record.week_key)));
        assert!(lines.contains(&"- Status: `success`".to_string()));
    }
}
