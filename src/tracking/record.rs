use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tracking::config::TrackingConfig;

pub const SCHEMA_VERSION: &str = "tracking.v1";

/// One query's outcome. Optional fields serialize as explicit `null` when the
/// target was not located; never a sentinel numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub found: bool,
    pub rank: Option<u32>,
    pub installs: Option<i64>,
    pub skill_id: Option<String>,
    pub source: Option<String>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            found: false,
            rank: None,
            installs: None,
            skill_id: None,
            source: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub exists: bool,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoStats {
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub watchers: Option<i64>,
    pub release_v0_1_0: ReleaseInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Immutable snapshot of one scheduled measurement cycle. `week_key` is the
/// idempotency key: at most one published record per ISO calendar week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub schema_version: String,
    pub timestamp_utc: String,
    pub week_key: String,
    pub status: RunStatus,
    pub skill_source: String,
    pub search_limit: u32,
    pub queries: Vec<QueryResult>,
    pub errors: Vec<String>,
    pub repo_stats: RepoStats,
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// ISO calendar week identifier (`YYYY-W##`), Monday start. The ISO week year
/// can differ from the calendar year around January 1st.
pub fn week_key(instant: DateTime<Utc>) -> String {
    let week = instant.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// ISO-8601 with second precision and explicit UTC offset, e.g.
/// `2026-02-02T08:30:00+00:00`. String comparison sorts chronologically.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Pure assembly of the run record. `errors` and `status` derive from the
/// per-query error fields; query order is preserved as given.
pub fn build_run_record(
    cfg: &TrackingConfig,
    started_at: DateTime<Utc>,
    queries: Vec<QueryResult>,
    repo_stats: RepoStats,
) -> RunRecord {
    let errors: Vec<String> = queries
        .iter()
        .filter_map(|row| {
            row.error
                .as_ref()
                .map(|err| format!("{}: {err}", row.query))
        })
        .collect();
    let status = if errors.is_empty() {
        RunStatus::Success
    } else {
        RunStatus::Partial
    };

    RunRecord {
        schema_version: SCHEMA_VERSION.to_string(),
        timestamp_utc: format_timestamp(started_at),
        week_key: week_key(started_at),
        status,
        skill_source: cfg.skill_source.clone(),
        search_limit: cfg.search_limit,
        queries,
        errors,
        repo_stats,
    }
}
