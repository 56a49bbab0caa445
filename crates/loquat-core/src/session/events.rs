//! Signals for the render layer

use super::state::StreamStatus;
use crate::types::TokenTotals;

/// State change notifications emitted by a [`super::ChatSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Message list cleared (chat closed or switched)
    MessagesReset,
    /// A message was pushed at `index`
    MessageAppended { index: usize },
    /// The message at `index` changed in place (streaming text)
    MessageUpdated { index: usize },
    /// `count` older messages were inserted at the front
    MessagesPrepended { count: usize },
    /// A brand-new chat got its id; the UI should route to it
    Navigate { chat_id: String },
    RegistryChanged,
    /// Model, max output tokens or web search flag changed
    MetadataChanged,
    TokensChanged(TokenTotals),
    /// A stream left the Streaming state
    StreamFinished { chat_id: String, status: StreamStatus },
    /// User-visible failure; aborts never produce this
    Error { message: String },
}
