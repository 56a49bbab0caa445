//! Scripted backend for session tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::api::ChatBackend;
use crate::error::{ChatError, Result};
use crate::stream::{pump_ndjson, StreamChunk, StreamOutcome};
use crate::types::{ChatMessage, MessagesPage, SendMessage, SendMessageResponse};

pub(crate) enum StreamScript {
    /// Whole NDJSON body delivered in one read
    Body(String),
    /// Non-2xx answer before any body
    Status(u16),
    /// Body fed by the test through a channel
    Manual(mpsc::UnboundedReceiver<Result<Bytes>>),
}

#[derive(Clone)]
pub(crate) enum PageScript {
    Page(MessagesPage),
    Status(u16),
    /// Page released once the notify fires
    Delayed(MessagesPage, Arc<Notify>),
}

pub(crate) struct FakeBackend {
    streams: Mutex<VecDeque<StreamScript>>,
    pages: Mutex<HashMap<(String, u32), VecDeque<PageScript>>>,
    send_result: Mutex<std::result::Result<SendMessageResponse, u16>>,
    settings_status: Mutex<Option<u16>>,
    tokens: Mutex<Vec<CancellationToken>>,
    pub stream_calls: Mutex<Vec<String>>,
    /// For each stream call: were all earlier tokens cancelled at call time
    pub prior_cancelled: Mutex<Vec<bool>>,
    pub page_calls: Mutex<Vec<(String, u32)>>,
    pub sends: Mutex<Vec<SendMessage>>,
    pub settings_calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            pages: Mutex::new(HashMap::new()),
            send_result: Mutex::new(Err(500)),
            settings_status: Mutex::new(None),
            tokens: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(Vec::new()),
            prior_cancelled: Mutex::new(Vec::new()),
            page_calls: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            settings_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().push_back(script);
    }

    /// Queue a stream whose body the test writes chunk by chunk
    pub fn push_manual_stream(&self) -> mpsc::UnboundedSender<Result<Bytes>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_stream(StreamScript::Manual(rx));
        tx
    }

    /// Queue a response for `(chat_id, page)`; the last one queued repeats
    pub fn push_page(&self, chat_id: &str, page: u32, script: PageScript) {
        self.pages
            .lock()
            .entry((chat_id.to_string(), page))
            .or_default()
            .push_back(script);
    }

    pub fn set_send_result(&self, result: std::result::Result<SendMessageResponse, u16>) {
        *self.send_result.lock() = result;
    }

    pub fn set_settings_status(&self, status: Option<u16>) {
        *self.settings_status.lock() = status;
    }

    pub fn stream_call_count(&self) -> usize {
        self.stream_calls.lock().len()
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.lock().len()
    }

    fn next_page_script(&self, chat_id: &str, page: u32) -> Option<PageScript> {
        let mut pages = self.pages.lock();
        let queue = pages.get_mut(&(chat_id.to_string(), page))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn fetch_messages_page(&self, chat_id: &str, page: u32) -> Result<MessagesPage> {
        self.page_calls.lock().push((chat_id.to_string(), page));
        match self.next_page_script(chat_id, page) {
            Some(PageScript::Page(p)) => Ok(p),
            Some(PageScript::Status(status)) => Err(ChatError::Http { status }),
            Some(PageScript::Delayed(p, gate)) => {
                gate.notified().await;
                Ok(p)
            }
            None => Ok(MessagesPage::default()),
        }
    }

    async fn send_user_message(&self, message: &SendMessage) -> Result<SendMessageResponse> {
        self.sends.lock().push(message.clone());
        self.send_result
            .lock()
            .clone()
            .map_err(|status| ChatError::Http { status })
    }

    async fn stream_assistant_message(
        &self,
        chat_id: &str,
        cancel: &CancellationToken,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<StreamOutcome> {
        self.stream_calls.lock().push(chat_id.to_string());
        {
            let mut tokens = self.tokens.lock();
            let all_cancelled = tokens.iter().all(|t| t.is_cancelled());
            self.prior_cancelled.lock().push(all_cancelled);
            tokens.push(cancel.clone());
        }

        let script = self.streams.lock().pop_front();
        match script {
            Some(StreamScript::Body(body)) => {
                let body = futures::stream::iter(vec![Ok::<_, ChatError>(Bytes::from(body))]);
                pump_ndjson(body, cancel, on_chunk).await
            }
            Some(StreamScript::Manual(rx)) => {
                pump_ndjson(UnboundedReceiverStream::new(rx), cancel, on_chunk).await
            }
            Some(StreamScript::Status(status)) => Err(ChatError::Http { status }),
            None => Err(ChatError::Http { status: 404 }),
        }
    }

    async fn toggle_web_search_mode(&self, chat_id: &str) -> Result<()> {
        self.settings_result(chat_id)
    }

    async fn change_max_output_tokens(&self, chat_id: &str, _max: u32) -> Result<()> {
        self.settings_result(chat_id)
    }
}

impl FakeBackend {
    fn settings_result(&self, chat_id: &str) -> Result<()> {
        self.settings_calls.lock().push(chat_id.to_string());
        match *self.settings_status.lock() {
            Some(status) => Err(ChatError::Http { status }),
            None => Ok(()),
        }
    }
}

/// NDJSON line for a non-final record
pub(crate) fn continuation(content: &str) -> String {
    format!(
        "{}\n",
        serde_json::json!({ "content": content, "isLastChunk": false })
    )
}

/// NDJSON line for the final record
pub(crate) fn terminal(content: &str, title: Option<&str>, prompt: u64, completion: u64) -> String {
    let mut record = serde_json::json!({
        "content": content,
        "isLastChunk": true,
        "promptTokens": prompt,
        "completionTokens": completion,
    });
    if let Some(title) = title {
        record["chatTitle"] = serde_json::Value::from(title);
    }
    format!("{}\n", record)
}

pub(crate) fn page_of(contents: &[&str]) -> MessagesPage {
    MessagesPage {
        history_messages: contents.iter().map(|c| ChatMessage::user(*c)).collect(),
        ..MessagesPage::default()
    }
}

/// Drain every event queued so far
pub(crate) fn drain(
    events: &mut mpsc::UnboundedReceiver<super::SessionEvent>,
) -> Vec<super::SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
