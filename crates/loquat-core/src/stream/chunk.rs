//! Assistant stream records
//!
//! Each NDJSON line is `{ content, isLastChunk, chatTitle?, promptTokens?, completionTokens? }`.
//! The title and token fields only mean something on the last line, so the
//! decoded form splits the two cases.

use serde::Deserialize;

use crate::error::{ChatError, Result};
use crate::types::TokenUsage;

/// One decoded line of the assistant stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireChunk")]
pub enum StreamChunk {
    /// More text follows
    Continuation { content: String },
    /// Last record of the stream
    Terminal {
        content: String,
        chat_title: Option<String>,
        usage: TokenUsage,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChunk {
    #[serde(default)]
    content: String,
    is_last_chunk: bool,
    #[serde(default)]
    chat_title: Option<String>,
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

impl From<WireChunk> for StreamChunk {
    fn from(wire: WireChunk) -> Self {
        if wire.is_last_chunk {
            StreamChunk::Terminal {
                content: wire.content,
                chat_title: wire.chat_title,
                usage: TokenUsage {
                    prompt_tokens: wire.prompt_tokens.unwrap_or(0),
                    completion_tokens: wire.completion_tokens.unwrap_or(0),
                },
            }
        } else {
            StreamChunk::Continuation {
                content: wire.content,
            }
        }
    }
}

impl StreamChunk {
    /// Parse one NDJSON line
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|source| ChatError::MalformedChunk {
            line: line.to_string(),
            source,
        })
    }

    pub fn content(&self) -> &str {
        match self {
            StreamChunk::Continuation { content } | StreamChunk::Terminal { content, .. } => {
                content
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Terminal { .. })
    }
}
