//! Backend seam
//!
//! The session state talks to the server only through this trait, so it can
//! run against [`super::ChatApiClient`] or a scripted fake.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::{StreamChunk, StreamOutcome};
use crate::types::{MessagesPage, SendMessage, SendMessageResponse};

/// Chat backend operations
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `GET /chat/{chatId}/messages?page={page}`
    async fn fetch_messages_page(&self, chat_id: &str, page: u32) -> Result<MessagesPage>;

    /// `POST /chat/send-user-message`
    async fn send_user_message(&self, message: &SendMessage) -> Result<SendMessageResponse>;

    /// `GET /chat/assistant-message/{chatId}`, one callback per NDJSON record
    ///
    /// Resolves `Ok(StreamOutcome::Aborted)` when `cancel` fires.
    async fn stream_assistant_message(
        &self,
        chat_id: &str,
        cancel: &CancellationToken,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<StreamOutcome>;

    /// `PATCH /chat/{chatId}/toggle-web-search-mode`
    async fn toggle_web_search_mode(&self, chat_id: &str) -> Result<()>;

    /// `PATCH /chat/{chatId}/change-max-output-tokens`
    async fn change_max_output_tokens(&self, chat_id: &str, max_output_tokens: u32)
        -> Result<()>;
}
