use anyhow::Result;

/// A comment as read back from the issue thread.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredComment {
    pub id: u64,
    pub html_url: String,
    pub body: String,
}

/// The tracking issue as a storage backend: list/create/replace comments,
/// read/replace the body. No transactional guarantee across calls; two
/// writers racing on the same week resolve last-write-wins.
pub trait IssueStore {
    fn list_comments(&self) -> Result<Vec<StoredComment>>;
    fn create_comment(&mut self, body: &str) -> Result<StoredComment>;
    fn update_comment(&mut self, comment_id: u64, body: &str) -> Result<()>;
    fn issue_body(&self) -> Result<String>;
    fn set_issue_body(&mut self, body: &str) -> Result<()>;
}
