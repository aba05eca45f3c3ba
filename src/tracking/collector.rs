use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::github::api::GithubApi;
use crate::skills::search::SearchBackend;
use crate::tracking::config::TrackingConfig;
use crate::tracking::record::{QueryResult, ReleaseInfo, RepoStats};
use crate::tracking::warn;

/// Per-query measurements plus the raw payloads kept for the comment's
/// nested detail sections.
#[derive(Debug, Clone)]
pub struct Observation {
    pub results: Vec<QueryResult>,
    pub raw_by_query: BTreeMap<String, Value>,
}

/// Locate the target skill in a ranked search payload. Matches on exact
/// source or id prefix; rank is the 1-based position in the returned list.
pub fn find_target_skill<'a>(
    payload: &'a Value,
    skill_source: &str,
) -> (Option<u32>, Option<&'a Value>) {
    let Some(skills) = payload.get("skills").and_then(Value::as_array) else {
        return (None, None);
    };
    let id_prefix = format!("{skill_source}/");
    for (idx, item) in skills.iter().enumerate() {
        if !item.is_object() {
            continue;
        }
        let source = item.get("source").and_then(Value::as_str).unwrap_or("");
        let id = item.get("id").and_then(Value::as_str).unwrap_or("");
        if source == skill_source || id.starts_with(&id_prefix) {
            return (Some((idx + 1) as u32), Some(item));
        }
    }
    (None, None)
}

fn installs_of(item: &Value) -> Option<i64> {
    let installs = item.get("installs")?;
    if let Some(n) = installs.as_i64() {
        return Some(n);
    }
    installs.as_str().and_then(|raw| raw.trim().parse::<i64>().ok())
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(ToString::to_string)
}

/// Run every canonical query sequentially. A single query's failure is
/// recorded on its row and never aborts the remaining queries.
pub fn collect_observations(cfg: &TrackingConfig, search: &dyn SearchBackend) -> Observation {
    let mut results = Vec::with_capacity(cfg.queries.len());
    let mut raw_by_query = BTreeMap::new();

    for query in &cfg.queries {
        match search.search(query, cfg.search_limit) {
            Ok(payload) => {
                let (rank, target) = find_target_skill(&payload, &cfg.skill_source);
                results.push(QueryResult {
                    query: query.clone(),
                    found: rank.is_some(),
                    rank,
                    installs: target.and_then(installs_of),
                    skill_id: target.and_then(|item| str_field(item, "id")),
                    source: target.and_then(|item| str_field(item, "source")),
                    error: None,
                });
                raw_by_query.insert(query.clone(), payload);
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn::emit("collect", query, "search_failed", &message);
                raw_by_query.insert(query.clone(), serde_json::json!({ "error": message }));
                results.push(QueryResult::failed(query.clone(), message));
            }
        }
    }

    Observation {
        results,
        raw_by_query,
    }
}

/// Repository statistics for the tracked repo. Unlike per-query searches,
/// a failure here is fatal for the whole run. A missing release tag is not
/// a failure; it records as absent.
pub fn collect_repo_stats(api: &GithubApi, repo: &str, release_tag: &str) -> Result<RepoStats> {
    let repo_data = api
        .repo(repo)
        .with_context(|| format!("repository statistics lookup failed for {repo}"))?;
    let release = api
        .release_by_tag(repo, release_tag)
        .with_context(|| format!("release lookup failed for {repo} tag {release_tag}"))?;

    Ok(RepoStats {
        stars: repo_data.get("stargazers_count").and_then(Value::as_i64),
        forks: repo_data.get("forks_count").and_then(Value::as_i64),
        watchers: repo_data.get("subscribers_count").and_then(Value::as_i64),
        release_v0_1_0: ReleaseInfo {
            exists: release.is_some(),
            url: release
                .as_ref()
                .and_then(|r| str_field(r, "html_url")),
            published_at: release
                .as_ref()
                .and_then(|r| str_field(r, "published_at")),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::config::SKILL_SOURCE;
    use anyhow::anyhow;

    fn ranked_payload() -> Value {
        serde_json::json!({
            "skills": [
                { "id": "someone-else/other-skill/v1", "source": "someone-else/other-skill", "installs": 900 },
                "not an object",
                { "id": format!("{SKILL_SOURCE}/v2"), "source": SKILL_SOURCE, "installs": 41 },
            ]
        })
    }

    struct FixedSearch {
        fail_on: &'static str,
    }

    impl SearchBackend for FixedSearch {
        fn search(&self, query: &str, _limit: u32) -> Result<Value> {
            if query == self.fail_on {
                return Err(anyhow!("connect timeout"));
            }
            Ok(ranked_payload())
        }
    }

    fn small_config(queries: &[&str]) -> TrackingConfig {
        TrackingConfig {
            queries: queries.iter().map(ToString::to_string).collect(),
            ..TrackingConfig::default()
        }
    }

    #[test]
    fn target_rank_counts_non_object_entries() {
        let payload = ranked_payload();
        let (rank, target) = find_target_skill(&payload, SKILL_SOURCE);
        assert_eq!(rank, Some(3));
        assert_eq!(installs_of(target.expect("target")), Some(41));
    }

    #[test]
    fn target_matches_on_id_prefix_alone() {
        let payload = serde_json::json!({
            "skills": [{ "id": format!("{SKILL_SOURCE}/fork"), "source": "a-mirror" }]
        });
        let (rank, _) = find_target_skill(&payload, SKILL_SOURCE);
        assert_eq!(rank, Some(1));
    }

    #[test]
    fn missing_skills_list_finds_nothing() {
        let payload = serde_json::json!({ "unexpected": true });
        assert_eq!(find_target_skill(&payload, SKILL_SOURCE), (None, None));
    }

    #[test]
    fn digit_string_installs_are_parsed() {
        let item = serde_json::json!({ "installs": "120" });
        assert_eq!(installs_of(&item), Some(120));
        let bad = serde_json::json!({ "installs": "many" });
        assert_eq!(installs_of(&bad), None);
    }

    #[test]
    fn one_failed_query_does_not_abort_the_rest() {
        let cfg = small_config(&["atomic", "mutex", "lock-free"]);
        let search = FixedSearch { fail_on: "mutex" };

        let observation = collect_observations(&cfg, &search);

        assert_eq!(observation.results.len(), 3);
        let failed = &observation.results[1];
        assert_eq!(failed.query, "mutex");
        assert!(!failed.found);
        assert!(failed.error.as_deref().unwrap_or("").contains("connect timeout"));
        assert!(observation.results[0].found);
        assert!(observation.results[2].found);

        let raw = observation.raw_by_query.get("mutex").expect("raw entry");
        assert!(raw.get("error").is_some());
    }

    #[test]
    fn results_preserve_canonical_query_order() {
        let cfg = small_config(&["zeta", "alpha", "midway"]);
        let search = FixedSearch { fail_on: "" };
        let observation = collect_observations(&cfg, &search);
        let order: Vec<&str> = observation
            .results
            .iter()
            .map(|row| row.query.as_str())
            .collect();
        assert_eq!(order, vec!["zeta", "alpha", "midway"]);
    }
}
