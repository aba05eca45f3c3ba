use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::tracking::config::ActionsContext;
use crate::tracking::ledger::{JSON_END, JSON_START};
use crate::tracking::record::RunRecord;
use crate::tracking::store::{IssueStore, StoredComment};

pub const RUN_END: &str = "<!-- tracking-run:end -->";

const TRUNCATION_HEADROOM: usize = 200;

/// The idempotency marker for one calendar week. The week key is embedded as
/// a literal substring, so markers for different weeks cannot collide.
pub fn week_marker(week_key: &str) -> String {
    format!("<!-- tracking-run:start week={week_key} -->")
}

/// Deterministic serialization: keys sorted, two-space indent. This is the
/// exact text the Ledger Reader parses back, so it must be stable across
/// runs for unchanged input.
fn to_sorted_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    let normalized = serde_json::to_value(value).context("serialization failed")?;
    serde_json::to_string_pretty(&normalized).context("serialization failed")
}

/// Cap one raw payload for embedding. Over the cap, the text is cut with an
/// explicit truncation marker and the original length annotated.
pub fn trim_raw(value: &Value, cap: usize) -> String {
    let text = match to_sorted_pretty(value) {
        Ok(text) => text,
        Err(_) => return "{}".to_string(),
    };
    let total_chars = text.chars().count();
    if total_chars <= cap {
        return text;
    }
    let keep = cap.saturating_sub(TRUNCATION_HEADROOM);
    let prefix: String = text.chars().take(keep).collect();
    format!("{prefix}\n\n... [truncated]\noriginal_length={total_chars} chars, limit={cap}")
}

/// Render the per-week comment: human-readable table, nested raw detail
/// sections, and the machine-recoverable JSON fragment between sentinels.
/// `extract_json_block(render(record)) == record` is the round-trip contract.
pub fn render_weekly_comment(
    record: &RunRecord,
    raw_by_query: &BTreeMap<String, Value>,
    raw_chars_limit: usize,
    actions: &ActionsContext,
) -> Result<String> {
    let mut lines: Vec<String> = Vec::new();
    lines.push(week_marker(&record.week_key));
    lines.push(format!("### Weekly tracking run `{}`", record.week_key));
    lines.push(format!("- Timestamp (UTC): `{}`", record.timestamp_utc));
    lines.push(format!("- Status: `{}`", record.status));
    lines.push(format!("- Target source: `{}`", record.skill_source));
    if let Some(run_url) = &actions.run_url {
        lines.push(format!("- Workflow run: {run_url}"));
    }
    lines.push(String::new());
    lines.push("| query | found | rank | installs |".to_string());
    lines.push("| --- | --- | --- | --- |".to_string());
    for row in &record.queries {
        let found = if row.found { "yes" } else { "no" };
        let rank = row
            .rank
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let installs = row
            .installs
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!("| `{}` | {found} | {rank} | {installs} |", row.query));
    }
    lines.push(String::new());
    lines.push("<details>".to_string());
    lines.push("<summary>Raw outputs (nested)</summary>".to_string());
    lines.push(String::new());
    for row in &record.queries {
        let missing = serde_json::json!({ "error": "missing raw output" });
        let raw = raw_by_query.get(&row.query).unwrap_or(&missing);
        lines.push("<details>".to_string());
        lines.push(format!("<summary>{}</summary>", row.query));
        lines.push(String::new());
        lines.push("```json".to_string());
        lines.push(trim_raw(raw, raw_chars_limit));
        lines.push("```".to_string());
        lines.push(String::new());
        lines.push("</details>".to_string());
        lines.push(String::new());
    }
    lines.push("</details>".to_string());
    lines.push(String::new());
    lines.push(JSON_START.to_string());
    lines.push(to_sorted_pretty(record)?);
    lines.push(JSON_END.to_string());
    lines.push(RUN_END.to_string());
    Ok(lines.join("\n"))
}

/// Find the existing comment for a week, if any. First match wins; by
/// construction the writer never creates a second one.
pub fn find_week_comment(comments: &[StoredComment], week_key: &str) -> Option<u64> {
    let marker = week_marker(week_key);
    comments
        .iter()
        .find(|comment| comment.body.contains(&marker))
        .map(|comment| comment.id)
}

/// Idempotent publish: replace the week's comment in place when it exists,
/// create it otherwise. At most one comment per week key.
pub fn publish_run(store: &mut dyn IssueStore, record: &RunRecord, body: &str) -> Result<()> {
    let comments = store
        .list_comments()
        .context("listing issue comments failed")?;
    match find_week_comment(&comments, &record.week_key) {
        Some(comment_id) => store
            .update_comment(comment_id, body)
            .with_context(|| format!("updating weekly comment for {} failed", record.week_key)),
        None => {
            store
                .create_comment(body)
                .with_context(|| format!("creating weekly comment for {} failed", record.week_key))?;
            Ok(())
        }
    }
}
