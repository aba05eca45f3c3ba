use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub API {method} {path} failed ({status}): {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    #[error("GitHub API {method} {path} returned an unexpected payload: {reason}")]
    Payload {
        method: String,
        path: String,
        reason: String,
    },
}
