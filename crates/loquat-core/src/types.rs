//! Wire and domain types shared by the stream pipeline and the session state

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// One message of a conversation, as exchanged with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            file: None,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    /// Empty assistant message that a stream renders into
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            file: None,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}

/// Token counts reported by the final chunk of a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Running token totals of the open chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenTotals {
    pub fn add(&mut self, usage: TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(usage.completion_tokens);
    }
}

/// Chat-level settings delivered with the most recent history page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMetadata {
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub web_search: bool,
}

/// Response of `GET /chat/{chatId}/messages?page={n}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesPage {
    #[serde(default)]
    pub history_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub is_web_search_mode: bool,
    #[serde(default)]
    pub total_prompt_tokens: u64,
    #[serde(default)]
    pub total_completion_tokens: u64,
}

impl MessagesPage {
    pub fn metadata(&self) -> ChatMetadata {
        ChatMetadata {
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
            web_search: self.is_web_search_mode,
        }
    }

    pub fn totals(&self) -> TokenTotals {
        TokenTotals {
            prompt_tokens: self.total_prompt_tokens,
            completion_tokens: self.total_completion_tokens,
        }
    }
}

/// A user message to post before the assistant stream is opened
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub content: String,
    pub max_output_tokens: u32,
    pub web_search: bool,
    pub model: Option<String>,
    /// None for a brand-new conversation
    pub chat_id: Option<String>,
    /// Attachment uploaded as the `file` form field
    pub file: Option<PathBuf>,
    pub prompt_id: Option<String>,
}

impl SendMessage {
    pub fn new(content: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            content: content.into(),
            max_output_tokens,
            web_search: false,
            model: None,
            chat_id: None,
            file: None,
            prompt_id: None,
        }
    }
}

/// Response of `POST /chat/send-user-message`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub chat_id: String,
    #[serde(default)]
    pub is_new: bool,
}
