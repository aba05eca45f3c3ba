use anyhow::{Context, Result};
use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;
use crate::tracking::store::{IssueStore, StoredComment};

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "rankwatch-tracking-updater";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const COMMENTS_PAGE_SIZE: usize = 100;
const ERROR_BODY_CAP: usize = 800;

pub struct GithubApi {
    client: Client,
    token: String,
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

impl GithubApi {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        query: &[(&str, String)],
        allow_not_found: bool,
    ) -> Result<Option<Value>> {
        let url = format!("{API_BASE}{path}");
        let mut req = self
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(payload) = payload {
            req = req.json(payload);
        }

        let response = req
            .send()
            .with_context(|| format!("GitHub API {method} {path} request failed"))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND && allow_not_found {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: clip(&body, ERROR_BODY_CAP),
            }
            .into());
        }

        let json = response
            .json()
            .with_context(|| format!("GitHub API {method} {path} returned invalid JSON"))?;
        Ok(Some(json))
    }

    fn request_value(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let value = self.request(method.clone(), path, payload, query, false)?;
        value.ok_or_else(|| {
            ApiError::Payload {
                method: method.to_string(),
                path: path.to_string(),
                reason: "empty response".to_string(),
            }
            .into()
        })
    }

    pub fn repo(&self, repo: &str) -> Result<Value> {
        self.request_value(Method::GET, &format!("/repos/{repo}"), None, &[])
    }

    /// Release lookup by tag; a 404 means the release does not exist yet.
    pub fn release_by_tag(&self, repo: &str, tag: &str) -> Result<Option<Value>> {
        self.request(
            Method::GET,
            &format!("/repos/{repo}/releases/tags/{tag}"),
            None,
            &[],
            true,
        )
    }

    pub fn issue(&self, repo: &str, issue_number: u64) -> Result<Value> {
        self.request_value(
            Method::GET,
            &format!("/repos/{repo}/issues/{issue_number}"),
            None,
            &[],
        )
    }

    pub fn set_issue_body(&self, repo: &str, issue_number: u64, body: &str) -> Result<()> {
        let payload = serde_json::json!({ "body": body });
        self.request_value(
            Method::PATCH,
            &format!("/repos/{repo}/issues/{issue_number}"),
            Some(&payload),
            &[],
        )?;
        Ok(())
    }

    pub fn list_issue_comments(&self, repo: &str, issue_number: u64) -> Result<Vec<Value>> {
        let path = format!("/repos/{repo}/issues/{issue_number}/comments");
        let mut comments = Vec::new();
        let mut page = 1usize;
        loop {
            let batch = self.request_value(
                Method::GET,
                &path,
                None,
                &[
                    ("per_page", COMMENTS_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            let Some(batch) = batch.as_array() else {
                return Err(ApiError::Payload {
                    method: "GET".to_string(),
                    path,
                    reason: "issue comments payload is not a list".to_string(),
                }
                .into());
            };
            let batch_len = batch.len();
            comments.extend(batch.iter().cloned());
            if batch_len < COMMENTS_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(comments)
    }

    pub fn create_issue_comment(&self, repo: &str, issue_number: u64, body: &str) -> Result<Value> {
        let payload = serde_json::json!({ "body": body });
        self.request_value(
            Method::POST,
            &format!("/repos/{repo}/issues/{issue_number}/comments"),
            Some(&payload),
            &[],
        )
    }

    pub fn update_issue_comment(&self, repo: &str, comment_id: u64, body: &str) -> Result<Value> {
        let payload = serde_json::json!({ "body": body });
        self.request_value(
            Method::PATCH,
            &format!("/repos/{repo}/issues/comments/{comment_id}"),
            Some(&payload),
            &[],
        )
    }
}

pub(crate) fn comment_from_value(value: &Value) -> Option<StoredComment> {
    Some(StoredComment {
        id: value.get("id").and_then(Value::as_u64)?,
        html_url: value
            .get("html_url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        body: value
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// `IssueStore` view of one tracking issue, backed by the REST client.
pub struct GithubIssueStore<'a> {
    api: &'a GithubApi,
    repo: String,
    issue_number: u64,
}

impl<'a> GithubIssueStore<'a> {
    pub fn new(api: &'a GithubApi, repo: impl Into<String>, issue_number: u64) -> Self {
        Self {
            api,
            repo: repo.into(),
            issue_number,
        }
    }
}

impl IssueStore for GithubIssueStore<'_> {
    fn list_comments(&self) -> Result<Vec<StoredComment>> {
        let raw = self.api.list_issue_comments(&self.repo, self.issue_number)?;
        Ok(raw.iter().filter_map(comment_from_value).collect())
    }

    fn create_comment(&mut self, body: &str) -> Result<StoredComment> {
        let created = self
            .api
            .create_issue_comment(&self.repo, self.issue_number, body)?;
        comment_from_value(&created).ok_or_else(|| {
            ApiError::Payload {
                method: "POST".to_string(),
                path: format!("/repos/{}/issues/{}/comments", self.repo, self.issue_number),
                reason: "created comment payload is missing an id".to_string(),
            }
            .into()
        })
    }

    fn update_comment(&mut self, comment_id: u64, body: &str) -> Result<()> {
        self.api
            .update_issue_comment(&self.repo, comment_id, body)?;
        Ok(())
    }

    fn issue_body(&self) -> Result<String> {
        let issue = self.api.issue(&self.repo, self.issue_number)?;
        Ok(issue
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn set_issue_body(&mut self, body: &str) -> Result<()> {
        self.api
            .set_issue_body(&self.repo, self.issue_number, body)
    }
}
