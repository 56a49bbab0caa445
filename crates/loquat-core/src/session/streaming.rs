//! Assistant stream state machine
//!
//! `Idle -> Streaming -> Completed | Aborted | Errored -> Idle`. At most one
//! session streams at a time; starting another aborts the first before its
//! request goes out. Callbacks carry their session id, so a superseded
//! session can never touch the message list.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::core::ChatSession;
use super::events::SessionEvent;
use super::registry::ChatSummary;
use super::state::{PaginationCursor, SessionState, StreamSession, StreamStatus};
use crate::constants::chat::FIRST_PAGE;
use crate::error::{ChatError, Result};
use crate::stream::{StreamChunk, StreamOutcome};
use crate::types::{ChatMessage, SendMessage, TokenUsage};

/// Join handle for a spawned stream
pub struct StreamHandle {
    chat_id: String,
    task: JoinHandle<Result<StreamStatus>>,
}

impl StreamHandle {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Wait for the stream to settle
    ///
    /// Aborts resolve `Ok(StreamStatus::Aborted)`; failures return the error
    /// that was also reported as [`SessionEvent::Error`].
    pub async fn wait(self) -> Result<StreamStatus> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(StreamStatus::Aborted),
        }
    }
}

impl ChatSession {
    /// Open the assistant stream for `chat_id`
    ///
    /// Any session still streaming is aborted first. An empty assistant
    /// message is appended before this returns; chunks render into it.
    /// With no chat open, the stream is finalized as a brand-new chat.
    pub fn start(&self, chat_id: &str) -> StreamHandle {
        let new_chat = self.state.lock().current_chat_id.is_none();
        self.start_with(chat_id, new_chat)
    }

    fn start_with(&self, chat_id: &str, new_chat: bool) -> StreamHandle {
        let (session_id, cancel) = self.state.lock().begin_stream(chat_id, new_chat);

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let chat = chat_id.to_string();
        let task = tokio::spawn(async move {
            let mut on_chunk = |chunk: StreamChunk| state.lock().apply_chunk(session_id, chunk);
            let result = backend
                .stream_assistant_message(&chat, &cancel, &mut on_chunk)
                .await;
            state.lock().finish_stream(session_id, result)
        });

        StreamHandle {
            chat_id: chat_id.to_string(),
            task,
        }
    }

    /// Abort the active stream, if any
    pub fn stop(&self) {
        self.state.lock().abort_stream();
    }

    /// Post a user message and stream the reply
    ///
    /// The user message is appended before the request and stays in the list
    /// if the request fails. Without an explicit chat id the message goes to
    /// the current chat, or starts a new one.
    pub async fn send_message(&self, mut message: SendMessage) -> Result<StreamHandle> {
        let (epoch, new_chat) = {
            let mut state = self.state.lock();
            state.abort_stream();
            if message.chat_id.is_none() {
                message.chat_id = state.current_chat_id.clone();
            }
            let mut user = ChatMessage::user(message.content.clone());
            user.file = message
                .file
                .as_deref()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned());
            state.push_message(user);
            (state.epoch, message.chat_id.is_none())
        };

        info!(
            "Sending user message ({} chars) to {:?}",
            message.content.len(),
            message.chat_id
        );
        let response = match self.backend.send_user_message(&message).await {
            Ok(response) => response,
            Err(e) => {
                error!("Send user message failed: {}", e);
                self.state.lock().emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if self.state.lock().epoch != epoch {
            info!("Chat switched while sending; not streaming the reply");
            return Err(ChatError::Aborted);
        }
        debug!(
            "Message accepted for chat {} (new: {})",
            response.chat_id, response.is_new
        );
        Ok(self.start_with(&response.chat_id, new_chat))
    }
}

impl SessionState {
    fn begin_stream(&mut self, chat_id: &str, new_chat: bool) -> (u64, CancellationToken) {
        self.abort_stream();

        let id = self.allocate_stream_id();
        let cancel = CancellationToken::new();
        let message_idx = self.push_message(ChatMessage::assistant_placeholder());
        self.stream = Some(StreamSession {
            id,
            chat_id: chat_id.to_string(),
            cancel: cancel.clone(),
            accumulated_text: String::new(),
            status: StreamStatus::Streaming,
            new_chat,
            message_idx,
        });

        info!(
            "Stream {} started for chat {} (new chat: {})",
            id, chat_id, new_chat
        );
        (id, cancel)
    }

    /// Cancel the active stream; no-op unless one is streaming
    pub(crate) fn abort_stream(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if stream.status != StreamStatus::Streaming {
            return;
        }
        stream.cancel.cancel();
        stream.status = StreamStatus::Aborted;
        let chat_id = stream.chat_id.clone();
        info!(
            "Stream {} aborted after {} chars",
            stream.id,
            stream.accumulated_text.len()
        );
        self.emit(SessionEvent::StreamFinished {
            chat_id,
            status: StreamStatus::Aborted,
        });
    }

    fn apply_chunk(&mut self, session_id: u64, chunk: StreamChunk) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if stream.id != session_id {
            debug!("Dropping chunk from superseded stream {}", session_id);
            return;
        }
        match stream.status {
            StreamStatus::Streaming => {}
            StreamStatus::Completed => {
                warn!("Ignoring chunk after the final chunk of stream {}", session_id);
                return;
            }
            _ => return,
        }

        let index = stream.message_idx;
        let content = chunk.content();
        stream.accumulated_text.push_str(content);
        if let Some(message) = self.messages.get_mut(index) {
            message.content.push_str(content);
        }
        debug!("Stream {} chunk: {} chars", session_id, content.len());
        self.emit(SessionEvent::MessageUpdated { index });

        if let StreamChunk::Terminal {
            chat_title, usage, ..
        } = chunk
        {
            self.finalize_stream(chat_title, usage);
        }
    }

    fn finalize_stream(&mut self, chat_title: Option<String>, usage: TokenUsage) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        stream.status = StreamStatus::Completed;
        stream.cancel.cancel();
        let new_chat = std::mem::take(&mut stream.new_chat);
        let chat_id = stream.chat_id.clone();
        let index = stream.message_idx;

        self.totals.add(usage);
        if let Some(message) = self.messages.get_mut(index) {
            message.prompt_tokens = Some(usage.prompt_tokens);
            message.completion_tokens = Some(usage.completion_tokens);
        }
        self.emit(SessionEvent::TokensChanged(self.totals));

        if new_chat {
            self.current_chat_id = Some(chat_id.clone());
            // The history page holding this exchange is already on screen
            let epoch = self.epoch;
            self.cursors.entry(chat_id.clone()).or_insert_with(|| {
                let mut cursor = PaginationCursor::new(&chat_id, epoch);
                cursor.next_page = FIRST_PAGE + 1;
                cursor
            });
            self.emit(SessionEvent::Navigate {
                chat_id: chat_id.clone(),
            });
            if self
                .registry
                .insert_if_absent(ChatSummary::new(chat_id.clone(), chat_title))
            {
                self.emit(SessionEvent::RegistryChanged);
            }
        } else if let Some(title) = chat_title {
            let untitled = self
                .registry
                .get(&chat_id)
                .is_some_and(|summary| summary.title.is_none());
            if untitled && self.registry.set_title(&chat_id, title) {
                self.emit(SessionEvent::RegistryChanged);
            }
        }

        info!(
            "Stream for chat {} completed: {} prompt / {} completion tokens",
            chat_id, usage.prompt_tokens, usage.completion_tokens
        );
        self.emit(SessionEvent::StreamFinished {
            chat_id,
            status: StreamStatus::Completed,
        });
    }

    fn finish_stream(
        &mut self,
        session_id: u64,
        result: Result<StreamOutcome>,
    ) -> Result<StreamStatus> {
        let Some(status) = self
            .stream
            .as_ref()
            .filter(|s| s.id == session_id)
            .map(|s| s.status)
        else {
            debug!("Superseded stream {} settled", session_id);
            return Ok(StreamStatus::Aborted);
        };

        match result {
            _ if status != StreamStatus::Streaming => {
                if let Err(e) = &result {
                    warn!("Stream {} failed after it settled: {}", session_id, e);
                }
                Ok(status)
            }
            Ok(StreamOutcome::Completed) => self.fail_stream(ChatError::Truncated),
            Ok(StreamOutcome::Aborted) => {
                self.abort_stream();
                Ok(StreamStatus::Aborted)
            }
            Err(e) if e.is_aborted() => {
                self.abort_stream();
                Ok(StreamStatus::Aborted)
            }
            Err(e) => self.fail_stream(e),
        }
    }

    fn fail_stream(&mut self, err: ChatError) -> Result<StreamStatus> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(err);
        };
        stream.status = StreamStatus::Errored;
        let chat_id = stream.chat_id.clone();
        error!("Stream for chat {} failed: {}", chat_id, err);

        self.emit(SessionEvent::StreamFinished {
            chat_id,
            status: StreamStatus::Errored,
        });
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
        if let Some(stream) = self.stream.as_mut() {
            stream.status = StreamStatus::Idle;
        }
        Err(err)
    }
}
