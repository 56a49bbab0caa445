//! Loquat Core - Streaming chat client library
//!
//! This crate provides everything behind the `loquat` front end:
//! - NDJSON assistant stream decoding with cancellation
//! - HTTP client for the chat backend
//! - Chat session state: stream state machine, history paging, chat registry
//! - Client configuration

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod session;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use api::{ChatApiClient, ChatBackend};
pub use config::ClientConfig;
pub use error::{ChatError, Result};
pub use session::{
    ChatRegistry, ChatSession, ChatSummary, GroupedChats, PageLoad, SessionEvent, StreamHandle,
    StreamStatus,
};
pub use stream::{StreamChunk, StreamOutcome};
pub use types::{ChatMessage, ChatMetadata, Role, SendMessage, TokenTotals};
