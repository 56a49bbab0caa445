//! Per-chat settings toggles

use tracing::{error, info};

use super::core::ChatSession;
use super::events::SessionEvent;
use crate::error::{ChatError, Result};

impl ChatSession {
    /// Flip web search for `chat_id` on the server, then locally
    pub async fn toggle_web_search(&self, chat_id: &str) -> Result<()> {
        if let Err(e) = self.backend.toggle_web_search_mode(chat_id).await {
            return Err(self.report_settings_error(chat_id, e));
        }

        let mut state = self.state.lock();
        if state.current_chat_id.as_deref() == Some(chat_id) {
            state.metadata.web_search = !state.metadata.web_search;
            info!(
                "Web search for chat {} is now {}",
                chat_id, state.metadata.web_search
            );
            state.emit(SessionEvent::MetadataChanged);
        }
        Ok(())
    }

    pub async fn change_max_output_tokens(
        &self,
        chat_id: &str,
        max_output_tokens: u32,
    ) -> Result<()> {
        if let Err(e) = self
            .backend
            .change_max_output_tokens(chat_id, max_output_tokens)
            .await
        {
            return Err(self.report_settings_error(chat_id, e));
        }

        let mut state = self.state.lock();
        if state.current_chat_id.as_deref() == Some(chat_id) {
            state.metadata.max_output_tokens = Some(max_output_tokens);
            info!(
                "Max output tokens for chat {} set to {}",
                chat_id, max_output_tokens
            );
            state.emit(SessionEvent::MetadataChanged);
        }
        Ok(())
    }

    fn report_settings_error(&self, chat_id: &str, err: ChatError) -> ChatError {
        error!("Updating settings of chat {} failed: {}", chat_id, err);
        self.state.lock().emit(SessionEvent::Error {
            message: err.to_string(),
        });
        err
    }
}
