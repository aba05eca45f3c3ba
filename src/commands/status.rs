use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::tracking::config;

include!(concat!(env!("OUT_DIR"), "/tracking_env_allowlist.rs"));

const REQUIRED_ENV: [&str; 3] = ["GITHUB_TOKEN", "GITHUB_REPOSITORY", "TRACKING_ISSUE_NUMBER"];

fn env_is_set(name: &str) -> bool {
    env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    report.detail(format!("build={}", env!("BUILD_UUID")));

    match config::load_config() {
        Ok(cfg) => {
            report.detail(format!("skill_source={}", cfg.skill_source));
            report.detail(format!("queries={}", cfg.queries.len()));
            report.detail(format!("search_limit={}", cfg.search_limit));
            report.detail(format!("raw_chars_limit={}", cfg.raw_chars_limit));
            report.detail(format!("search_base_url={}", cfg.search_base_url));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }
    if let Some(path) = config::resolve_config_path() {
        report.detail(format!(
            "config_path={} ({})",
            path.display(),
            if path.exists() { "present" } else { "absent" }
        ));
    }

    for key in GENERATED_ENV_ALLOWLIST.iter().copied() {
        report.detail(format!(
            "{key}={}",
            if env_is_set(key) { "set" } else { "unset" }
        ));
    }
    for key in REQUIRED_ENV {
        if !env_is_set(key) {
            report.issue(format!("missing required environment variable {key}"));
        }
    }

    Ok(report)
}
