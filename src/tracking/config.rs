use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Source identifier of the skill whose discoverability is tracked.
pub const SKILL_SOURCE: &str = "erikhuizinga/concurrency-lock-vs-lockfree";

/// Canonical query list. Order is significant: every table keeps this order.
pub const QUERIES: [&str; 18] = [
    "lock-free",
    "lockfree",
    "lock free",
    "lockless",
    "atomic",
    "mutex",
    "concurrency",
    "synchronization",
    "ABA",
    "memory ordering",
    "compare-and-swap",
    "CAS",
    "mutex vs lock-free",
    "ABA problem",
    "linearizability",
    "hazard pointers",
    "concurrency-lock-vs-lockfree",
    "erikhuizinga/concurrency-lock-vs-lockfree",
];

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const DEFAULT_RAW_CHARS_LIMIT: usize = 12_000;
pub const RELEASE_TAG: &str = "v0.1.0";

const DEFAULT_SEARCH_BASE_URL: &str = "https://skills.sh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub skill_source: String,
    pub queries: Vec<String>,
    pub search_limit: u32,
    pub raw_chars_limit: usize,
    pub search_base_url: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            skill_source: SKILL_SOURCE.to_string(),
            queries: QUERIES.iter().map(ToString::to_string).collect(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            raw_chars_limit: DEFAULT_RAW_CHARS_LIMIT,
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialTrackingConfig {
    skill_source: Option<String>,
    queries: Option<Vec<String>>,
    search_limit: Option<u32>,
    raw_chars_limit: Option<usize>,
    search_base_url: Option<String>,
}

/// Where the current run gets written: repo, issue, and the token to use.
#[derive(Debug, Clone)]
pub struct IssueTarget {
    pub token: String,
    pub repo: String,
    pub issue_number: u64,
}

/// GitHub Actions context, all optional. Absent outside workflow runs.
#[derive(Debug, Clone, Default)]
pub struct ActionsContext {
    pub run_url: Option<String>,
    pub step_summary_path: Option<String>,
}

pub fn require_env(name: &str) -> Result<String> {
    let value = env::var(name).unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Missing required environment variable: {name}");
    }
    Ok(trimmed.to_string())
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &TrackingConfig) -> Result<()> {
    if cfg.skill_source.trim().is_empty() {
        return Err(anyhow!("invalid skill source: cannot be empty"));
    }
    if cfg.queries.is_empty() {
        return Err(anyhow!("invalid query list: must contain at least one query"));
    }
    if cfg.queries.iter().any(|q| q.trim().is_empty()) {
        return Err(anyhow!("invalid query list: queries cannot be empty strings"));
    }
    if cfg.search_limit == 0 || cfg.search_limit > 100 {
        return Err(anyhow!("invalid search limit: require 1 <= limit <= 100"));
    }
    if cfg.raw_chars_limit < 1_000 {
        return Err(anyhow!("invalid raw chars limit: must be >= 1000"));
    }
    if cfg.search_base_url.trim().is_empty() {
        return Err(anyhow!("invalid search base url: cannot be empty"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("TRACKING_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".config/rankwatch").join("tracking.toml"))
}

fn merge_file_config(base: &mut TrackingConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialTrackingConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse tracking config {}: {err}", path.display()))?;
    if let Some(skill_source) = parsed.skill_source {
        base.skill_source = skill_source;
    }
    if let Some(queries) = parsed.queries {
        base.queries = queries;
    }
    if let Some(search_limit) = parsed.search_limit {
        base.search_limit = search_limit;
    }
    if let Some(raw_chars_limit) = parsed.raw_chars_limit {
        base.raw_chars_limit = raw_chars_limit;
    }
    if let Some(search_base_url) = parsed.search_base_url {
        base.search_base_url = search_base_url;
    }
    Ok(())
}

pub fn load_config() -> Result<TrackingConfig> {
    let mut cfg = TrackingConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.skill_source = env_or_string("TRACKING_SKILL_SOURCE", &cfg.skill_source);
    cfg.search_limit = env_or_u32("TRACKING_SEARCH_LIMIT", cfg.search_limit);
    cfg.raw_chars_limit = env_or_usize("TRACKING_RAW_CHARS_LIMIT", cfg.raw_chars_limit);
    cfg.search_base_url = env_or_string("TRACKING_SEARCH_BASE_URL", &cfg.search_base_url);

    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_issue_target() -> Result<IssueTarget> {
    let token = require_env("GITHUB_TOKEN")?;
    let repo = require_env("GITHUB_REPOSITORY")?;
    let issue_raw = require_env("TRACKING_ISSUE_NUMBER")?;
    let issue_number = issue_raw
        .parse::<u64>()
        .with_context(|| format!("TRACKING_ISSUE_NUMBER is not a valid issue number: {issue_raw}"))?;
    Ok(IssueTarget {
        token,
        repo,
        issue_number,
    })
}

pub fn load_actions_context() -> ActionsContext {
    let run_url = match (
        env_non_empty("GITHUB_SERVER_URL"),
        env_non_empty("GITHUB_REPOSITORY"),
        env_non_empty("GITHUB_RUN_ID"),
    ) {
        (Some(server), Some(repo), Some(run_id)) => Some(format!("{server}/{repo}/actions/runs/{run_id}")),
        _ => None,
    };
    ActionsContext {
        run_url,
        step_summary_path: env_non_empty("GITHUB_STEP_SUMMARY"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_canonical_query_list() {
        let cfg = TrackingConfig::default();
        assert_eq!(cfg.queries.len(), QUERIES.len());
        assert_eq!(cfg.search_limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(cfg.raw_chars_limit, DEFAULT_RAW_CHARS_LIMIT);
        validate(&cfg).expect("default config is valid");
    }

    #[test]
    fn queries_include_related_terminology_baseline() {
        let required = [
            "lockfree",
            "lock free",
            "concurrency-lock-vs-lockfree",
            "erikhuizinga/concurrency-lock-vs-lockfree",
        ];
        for query in required {
            assert!(QUERIES.contains(&query), "missing baseline query {query}");
        }
    }

    #[test]
    fn validate_rejects_zero_search_limit() {
        let cfg = TrackingConfig {
            search_limit: 0,
            ..TrackingConfig::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn validate_rejects_empty_query_entries() {
        let cfg = TrackingConfig {
            queries: vec!["atomic".to_string(), "  ".to_string()],
            ..TrackingConfig::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn partial_file_config_merges_over_defaults() {
        let parsed: PartialTrackingConfig =
            toml::from_str("search_limit = 25\nqueries = [\"atomic\", \"mutex\"]").expect("parse");
        let mut cfg = TrackingConfig::default();
        if let Some(queries) = parsed.queries {
            cfg.queries = queries;
        }
        if let Some(limit) = parsed.search_limit {
            cfg.search_limit = limit;
        }
        assert_eq!(cfg.search_limit, 25);
        assert_eq!(cfg.queries, vec!["atomic", "mutex"]);
        assert_eq!(cfg.skill_source, SKILL_SOURCE);
    }
}
