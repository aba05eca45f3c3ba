use crate::tracking::record::RunRecord;
use crate::tracking::store::StoredComment;

pub const JSON_START: &str = "<!-- tracking-json:start -->";
pub const JSON_END: &str = "<!-- tracking-json:end -->";

/// Where a published run record lives in the thread.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRef {
    pub id: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub record: RunRecord,
    pub comment: CommentRef,
}

/// Extract the machine-recoverable fragment between the JSON sentinels.
/// Missing markers, truncated fragments, and schema drift all yield `None`;
/// a bad comment never fails the scan.
pub fn extract_json_block(body: &str) -> Option<RunRecord> {
    let start = body.find(JSON_START)?;
    let after = start + JSON_START.len();
    let end = body[after..].find(JSON_END)?;
    let fragment = body[after..after + end].trim();
    serde_json::from_str(fragment).ok()
}

/// Recover every published run from the raw comment listing. The result is
/// unsorted: comments can be edited or listed out of timestamp order, so
/// consumers sort before any order-dependent computation.
pub fn recover_ledger(comments: &[StoredComment]) -> Vec<LedgerEntry> {
    comments
        .iter()
        .filter_map(|comment| {
            let record = extract_json_block(&comment.body)?;
            Some(LedgerEntry {
                record,
                comment: CommentRef {
                    id: comment.id,
                    html_url: comment.html_url.clone(),
                },
            })
        })
        .collect()
}
