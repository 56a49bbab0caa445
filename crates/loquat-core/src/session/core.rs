//! Chat session context
//!
//! The owned, injectable object through which all chat state is read and
//! mutated. Cloning shares the same state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::SessionEvent;
use super::registry::{ChatRegistry, ChatSummary, GroupedChats};
use super::state::{PaginationCursor, SessionState, StreamStatus};
use crate::api::ChatBackend;
use crate::types::{ChatMessage, ChatMetadata, TokenTotals};

/// Chat state plus the backend it talks to
#[derive(Clone)]
pub struct ChatSession {
    pub(crate) backend: Arc<dyn ChatBackend>,
    pub(crate) state: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    /// Create a session with an empty registry
    ///
    /// The receiver carries every [`SessionEvent`] for the render layer.
    pub fn new(backend: Arc<dyn ChatBackend>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::with_registry(backend, ChatRegistry::new())
    }

    pub fn with_registry(
        backend: Arc<dyn ChatBackend>,
        registry: ChatRegistry,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            backend,
            state: Arc::new(Mutex::new(SessionState::new(registry, tx))),
        };
        (session, rx)
    }

    /// Start a brand-new conversation; the next stream registers a new chat
    pub fn new_chat(&self) {
        self.state.lock().teardown(None);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn message(&self, index: usize) -> Option<ChatMessage> {
        self.state.lock().messages.get(index).cloned()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn last_message(&self) -> Option<ChatMessage> {
        self.state.lock().messages.last().cloned()
    }

    /// Text received by the latest stream so far
    pub fn accumulated_text(&self) -> String {
        self.state
            .lock()
            .stream
            .as_ref()
            .map(|s| s.accumulated_text.clone())
            .unwrap_or_default()
    }

    pub fn stream_status(&self) -> StreamStatus {
        self.state.lock().stream_status()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_status() == StreamStatus::Streaming
    }

    pub fn current_chat_id(&self) -> Option<String> {
        self.state.lock().current_chat_id.clone()
    }

    pub fn token_totals(&self) -> TokenTotals {
        self.state.lock().totals
    }

    pub fn metadata(&self) -> ChatMetadata {
        self.state.lock().metadata.clone()
    }

    pub fn cursor(&self, chat_id: &str) -> Option<PaginationCursor> {
        self.state.lock().cursors.get(chat_id).cloned()
    }

    pub fn registry(&self) -> ChatRegistry {
        self.state.lock().registry.clone()
    }

    pub fn grouped_chats(&self) -> GroupedChats {
        self.state.lock().registry.grouped()
    }

    /// Add a chat to the registry unless its id is already known
    pub fn register_chat(&self, summary: ChatSummary) -> bool {
        let mut state = self.state.lock();
        let inserted = state.registry.insert_if_absent(summary);
        if inserted {
            state.emit(SessionEvent::RegistryChanged);
        }
        inserted
    }

    pub fn remove_chat(&self, chat_id: &str) -> Option<ChatSummary> {
        let mut state = self.state.lock();
        let removed = state.registry.remove(chat_id);
        if removed.is_some() {
            state.emit(SessionEvent::RegistryChanged);
        }
        removed
    }

    pub fn toggle_favorite(&self, chat_id: &str) -> Option<bool> {
        let mut state = self.state.lock();
        let fav = state.registry.toggle_favorite(chat_id);
        if fav.is_some() {
            state.emit(SessionEvent::RegistryChanged);
        }
        fav
    }
}
