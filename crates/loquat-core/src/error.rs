//! Chat client error types

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the core library
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat client error type
#[derive(Debug, Error)]
pub enum ChatError {
    /// Backend answered with a non-2xx status
    #[error("server returned HTTP {status}")]
    Http { status: u16 },

    /// A stream line that does not decode as a chunk record
    #[error("malformed stream chunk: {source}")]
    MalformedChunk {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stream cancelled by stop() or by a newer stream
    #[error("stream aborted")]
    Aborted,

    /// Connection, DNS or body read failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Body ended before the final chunk arrived
    #[error("stream ended before the final chunk")]
    Truncated,

    /// Response body that does not match the expected JSON shape
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Attachment could not be read from disk
    #[error("cannot read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Base URL or chat id produced an unusable URL
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ChatError {
    /// Aborts are expected outcomes and never shown to the user
    pub fn is_aborted(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Http { status } => Some(*status),
            ChatError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
