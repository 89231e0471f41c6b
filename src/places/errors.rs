//! Error types for places provider calls.

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to places provider failed")]
    Request(#[from] reqwest::Error),
    #[error("places provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid places provider response: {0}")]
    InvalidResponse(String),
}
