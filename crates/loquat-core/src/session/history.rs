//! History pagination
//!
//! Older pages are fetched on demand and prepended, so the tail of the list
//! (and any stream rendering into it) keeps its content. Each chat has its
//! own cursor; a page that comes back empty exhausts it until the chat is
//! reopened.

use tracing::{debug, error, info};

use super::core::ChatSession;
use super::events::SessionEvent;
use super::state::{PaginationCursor, SessionState};
use crate::constants::chat::FIRST_PAGE;
use crate::error::Result;
use crate::types::MessagesPage;

/// Result of a page request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    /// `n` older messages arrived
    Loaded(usize),
    /// No older messages exist
    Exhausted,
    /// A fetch or stream for this chat is still running; nothing was fetched
    Busy,
    /// The chat was reopened while the page was in flight; result dropped
    Discarded,
}

enum Reservation {
    Ready(u64),
    Skip(PageLoad),
}

impl ChatSession {
    /// Fetch `page` of `chat_id` and prepend it if the chat is open
    ///
    /// Page 0 also carries the chat metadata and token totals. Errors are
    /// reported as [`SessionEvent::Error`] and returned; they never exhaust
    /// the cursor.
    pub async fn load_page(&self, chat_id: &str, page: u32) -> Result<PageLoad> {
        let generation = match self.state.lock().reserve_page(chat_id) {
            Reservation::Ready(generation) => generation,
            Reservation::Skip(outcome) => {
                debug!("Page {} of chat {} skipped: {:?}", page, chat_id, outcome);
                return Ok(outcome);
            }
        };

        info!("Loading page {} of chat {}", page, chat_id);
        let result = self.backend.fetch_messages_page(chat_id, page).await;
        self.state
            .lock()
            .complete_page(chat_id, page, generation, result)
    }

    /// Load the next older page (scroll to top)
    pub async fn load_older(&self, chat_id: &str) -> Result<PageLoad> {
        let next_page = match self.state.lock().cursors.get(chat_id) {
            Some(cursor) if cursor.exhausted => return Ok(PageLoad::Exhausted),
            Some(cursor) => cursor.next_page,
            None => FIRST_PAGE,
        };
        self.load_page(chat_id, next_page).await
    }

    /// Close the current chat and load the newest page of `chat_id`
    pub async fn open_chat(&self, chat_id: &str) -> Result<PageLoad> {
        self.state.lock().teardown(Some(chat_id.to_string()));
        self.load_page(chat_id, FIRST_PAGE).await
    }
}

impl SessionState {
    fn reserve_page(&mut self, chat_id: &str) -> Reservation {
        if self.is_streaming_chat(chat_id) {
            return Reservation::Skip(PageLoad::Busy);
        }
        let epoch = self.epoch;
        let cursor = self
            .cursors
            .entry(chat_id.to_string())
            .or_insert_with(|| PaginationCursor::new(chat_id, epoch));
        if cursor.exhausted {
            return Reservation::Skip(PageLoad::Exhausted);
        }
        if cursor.in_flight {
            return Reservation::Skip(PageLoad::Busy);
        }
        cursor.in_flight = true;
        Reservation::Ready(cursor.generation)
    }

    fn complete_page(
        &mut self,
        chat_id: &str,
        page: u32,
        generation: u64,
        result: Result<MessagesPage>,
    ) -> Result<PageLoad> {
        let Some(cursor) = self
            .cursors
            .get_mut(chat_id)
            .filter(|c| c.generation == generation)
        else {
            debug!("Discarding stale page {} of chat {}", page, chat_id);
            return Ok(PageLoad::Discarded);
        };
        cursor.in_flight = false;

        let page_data = match result {
            Ok(page_data) => page_data,
            Err(e) => {
                error!("Loading page {} of chat {} failed: {}", page, chat_id, e);
                self.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let count = page_data.history_messages.len();
        if count == 0 {
            cursor.exhausted = true;
        } else {
            cursor.next_page = cursor.next_page.max(page + 1);
        }

        let is_current = self.current_chat_id.as_deref() == Some(chat_id);
        if is_current && page == FIRST_PAGE {
            self.metadata = page_data.metadata();
            self.totals = page_data.totals();
            self.emit(SessionEvent::MetadataChanged);
            self.emit(SessionEvent::TokensChanged(self.totals));
        }

        if count == 0 {
            info!("Chat {} has no messages before page {}", chat_id, page);
            return Ok(PageLoad::Exhausted);
        }

        if is_current {
            self.messages.splice(0..0, page_data.history_messages);
            if let Some(stream) = self.stream.as_mut() {
                stream.message_idx += count;
            }
            self.emit(SessionEvent::MessagesPrepended { count });
        }
        info!("Loaded {} messages from page {} of chat {}", count, page, chat_id);
        Ok(PageLoad::Loaded(count))
    }
}
