use thiserror::Error;

/// Failure to obtain leaderboard records from the affiliate API.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// True when the API answered but the payload had an unexpected shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Failure to send a message through the chat transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("send timed out after {0}s")]
    Timeout(u64),

    #[error("send rejected: {0}")]
    Rejected(String),
}

/// Failure to delete a previously published message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeleteError {
    /// The message is already gone (deleted by hand, channel purged, ...).
    #[error("message not found")]
    NotFound,

    #[error("delete timed out after {0}s")]
    Timeout(u64),

    #[error("delete failed: {0}")]
    Other(String),
}

/// Errors surfaced by the leaderboard pipeline to its triggers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Publish(#[from] TransportError),

    #[error("invalid start date {input:?}, expected YYYY-MM-DD")]
    InvalidStartDate { input: String },

    #[error("custom message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },
}
