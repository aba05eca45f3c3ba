use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "rankwatch-tracking-updater";

/// The ranked search capability the collector measures against. Implemented
/// by the live skills.sh client and by fakes in tests.
pub trait SearchBackend {
    fn search(&self, query: &str, limit: u32) -> Result<Value>;
}

pub struct SkillsSearch {
    client: Client,
    base_url: String,
}

impl SkillsSearch {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl SearchBackend for SkillsSearch {
    fn search(&self, query: &str, limit: u32) -> Result<Value> {
        let url = format!("{}/api/search", self.base_url);
        let limit_text = limit.to_string();
        let response = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("q", query), ("limit", limit_text.as_str())])
            .send()
            .with_context(|| format!("search request failed for query {query:?}"))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "search for query {query:?} failed with status {}",
                response.status()
            );
        }
        response
            .json()
            .with_context(|| format!("invalid JSON from search for query {query:?}"))
    }
}
