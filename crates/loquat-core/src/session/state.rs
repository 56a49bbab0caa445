//! Shared chat state
//!
//! Everything the render layer sees lives here, behind one lock held only
//! across synchronous sections.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::events::SessionEvent;
use super::registry::ChatRegistry;
use crate::constants::chat::FIRST_PAGE;
use crate::types::{ChatMessage, ChatMetadata, TokenTotals};

/// Lifecycle of one assistant stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Streaming,
    Completed,
    Aborted,
    Errored,
}

/// One run of the stream state machine
#[derive(Debug)]
pub(crate) struct StreamSession {
    /// Generation; callbacks from older sessions are ignored
    pub id: u64,
    pub chat_id: String,
    pub cancel: CancellationToken,
    pub accumulated_text: String,
    pub status: StreamStatus,
    /// Started without a chat id; cleared by finalization
    pub new_chat: bool,
    /// Index of the assistant placeholder in the message list
    pub message_idx: usize,
}

/// Per-chat history paging position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    pub chat_id: String,
    pub next_page: u32,
    /// A page came back empty; no further fetches until the chat is reopened
    pub exhausted: bool,
    /// A page fetch is pending
    pub in_flight: bool,
    /// Epoch the cursor was created in; stale fetches are discarded
    pub(crate) generation: u64,
}

impl PaginationCursor {
    pub(crate) fn new(chat_id: &str, generation: u64) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            next_page: FIRST_PAGE,
            exhausted: false,
            in_flight: false,
            generation,
        }
    }
}

pub(crate) struct SessionState {
    pub messages: Vec<ChatMessage>,
    pub registry: ChatRegistry,
    pub totals: TokenTotals,
    pub metadata: ChatMetadata,
    /// None while composing a brand-new conversation
    pub current_chat_id: Option<String>,
    pub stream: Option<StreamSession>,
    pub cursors: HashMap<String, PaginationCursor>,
    /// Bumped on every chat switch
    pub epoch: u64,
    next_stream_id: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionState {
    pub fn new(registry: ChatRegistry, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            messages: Vec::new(),
            registry,
            totals: TokenTotals::default(),
            metadata: ChatMetadata::default(),
            current_chat_id: None,
            stream: None,
            cursors: HashMap::new(),
            epoch: 0,
            next_stream_id: 0,
            events,
        }
    }

    /// Send an event; a dropped receiver is not an error
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn allocate_stream_id(&mut self) -> u64 {
        self.next_stream_id += 1;
        self.next_stream_id
    }

    pub fn stream_status(&self) -> StreamStatus {
        self.stream
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(StreamStatus::Idle)
    }

    pub fn is_streaming_chat(&self, chat_id: &str) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| s.status == StreamStatus::Streaming && s.chat_id == chat_id)
    }

    pub fn push_message(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        let index = self.messages.len() - 1;
        self.emit(SessionEvent::MessageAppended { index });
        index
    }

    /// Close the current chat and make `next_chat` current
    ///
    /// Aborts any active stream and drops all per-chat state. A cursor for
    /// `next_chat` starts over at page 0.
    pub fn teardown(&mut self, next_chat: Option<String>) {
        self.abort_stream();
        self.epoch += 1;
        self.messages.clear();
        self.totals = TokenTotals::default();
        self.metadata = ChatMetadata::default();
        if let Some(chat_id) = &next_chat {
            self.cursors
                .insert(chat_id.clone(), PaginationCursor::new(chat_id, self.epoch));
        }
        info!(
            "Chat switched: {:?} -> {:?} (epoch {})",
            self.current_chat_id, next_chat, self.epoch
        );
        self.current_chat_id = next_chat;

        self.emit(SessionEvent::MessagesReset);
        self.emit(SessionEvent::MetadataChanged);
        self.emit(SessionEvent::TokensChanged(self.totals));
    }
}
