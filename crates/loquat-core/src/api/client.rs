//! Chat backend HTTP client

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use super::backend::ChatBackend;
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::stream::{stream_ndjson, StreamChunk, StreamOutcome};
use crate::types::{MessagesPage, SendMessage, SendMessageResponse};

/// Media type requested for the assistant stream
const NDJSON: &str = "application/x-ndjson";

/// HTTP client for the chat endpoints
pub struct ChatApiClient {
    http: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl ChatApiClient {
    /// Create the HTTP client
    ///
    /// Only the connect phase has a timeout: an assistant stream stays open
    /// for as long as the server keeps it open.
    fn create_http_client(config: &ClientConfig) -> Client {
        Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            })
    }

    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        info!("Chat backend: {}", base_url);
        Ok(Self {
            http: Self::create_http_client(config),
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a request with the auth header, if configured
    fn build_request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.bearer_token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request, failing on any non-2xx status
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        error!("API error response: {}", status);
        Err(ChatError::Http {
            status: status.as_u16(),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn build_send_form(message: &SendMessage) -> Result<Form> {
        let mut form = Form::new()
            .text("content", message.content.clone())
            .text("maxOutputTokens", message.max_output_tokens.to_string())
            .text("isWebSearchMode", message.web_search.to_string());

        if let Some(model) = &message.model {
            form = form.text("model", model.clone());
        }
        if let Some(chat_id) = &message.chat_id {
            form = form.text("chatId", chat_id.clone());
        }
        if let Some(prompt_id) = &message.prompt_id {
            form = form.text("promptId", prompt_id.clone());
        }
        if let Some(path) = &message.file {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| ChatError::Attachment {
                    path: path.clone(),
                    source,
                })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            debug!("Attaching {} ({} bytes)", file_name, bytes.len());
            form = form.part("file", Part::bytes(bytes).file_name(file_name));
        }

        Ok(form)
    }
}

#[async_trait]
impl ChatBackend for ChatApiClient {
    async fn fetch_messages_page(&self, chat_id: &str, page: u32) -> Result<MessagesPage> {
        let mut url = self.endpoint(&["chat", chat_id, "messages"])?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        debug!("Fetching history page {} for chat {}", page, chat_id);

        let page: MessagesPage = self.send_json(self.build_request(Method::GET, url)).await?;
        debug!("History page: {} messages", page.history_messages.len());
        Ok(page)
    }

    async fn send_user_message(&self, message: &SendMessage) -> Result<SendMessageResponse> {
        let url = self.endpoint(&["chat", "send-user-message"])?;
        let form = Self::build_send_form(message).await?;
        let request = self.build_request(Method::POST, url).multipart(form);

        let response: SendMessageResponse = self.send_json(request).await?;
        info!(
            "User message accepted: chat={}, new={}",
            response.chat_id, response.is_new
        );
        Ok(response)
    }

    async fn stream_assistant_message(
        &self,
        chat_id: &str,
        cancel: &CancellationToken,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> Result<StreamOutcome> {
        let url = self.endpoint(&["chat", "assistant-message", chat_id])?;
        info!("Opening assistant stream for chat {}", chat_id);
        let request = self.build_request(Method::GET, url).header(ACCEPT, NDJSON);
        stream_ndjson(request, cancel, on_chunk).await
    }

    async fn toggle_web_search_mode(&self, chat_id: &str) -> Result<()> {
        let url = self.endpoint(&["chat", chat_id, "toggle-web-search-mode"])?;
        self.send(self.build_request(Method::PATCH, url)).await?;
        Ok(())
    }

    async fn change_max_output_tokens(
        &self,
        chat_id: &str,
        max_output_tokens: u32,
    ) -> Result<()> {
        let url = self.endpoint(&["chat", chat_id, "change-max-output-tokens"])?;
        let body = serde_json::json!({ "maxOutputTokens": max_output_tokens });
        self.send(self.build_request(Method::PATCH, url).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::Role;

    const HELLO_STREAM: &str = concat!(
        "{\"content\":\"Hel\",\"isLastChunk\":false}\n",
        "{\"content\":\"lo\",\"isLastChunk\":false}\n",
        "{\"content\":\"!\",\"isLastChunk\":true,\"chatTitle\":\"Greeting\",\"promptTokens\":3,\"completionTokens\":2}\n",
    );

    fn client_for(server: &MockServer) -> ChatApiClient {
        let config = ClientConfig {
            base_url: server.uri(),
            bearer_token: Some("tok".to_string()),
            ..ClientConfig::default()
        };
        ChatApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_chat_id() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/api/".to_string(),
            ..ClientConfig::default()
        };
        let client = ChatApiClient::new(&config).unwrap();
        let url = client.endpoint(&["chat", "a b/c", "messages"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/chat/a%20b%2Fc/messages");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            ChatApiClient::new(&config),
            Err(ChatError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_assistant_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/assistant-message/c1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(HELLO_STREAM, NDJSON))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let mut chunks = Vec::new();
        let outcome = client
            .stream_assistant_message("c1", &cancel, &mut |chunk| chunks.push(chunk))
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(chunks.len(), 3);
        let text: String = chunks.iter().map(|c| c.content()).collect();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn test_stream_http_error_skips_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/assistant-message/c1"))
            .respond_with(ResponseTemplate::new(500).set_body_raw(HELLO_STREAM, NDJSON))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let mut count = 0;
        let err = client
            .stream_assistant_message("c1", &cancel, &mut |_| count += 1)
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Http { status: 500 }));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_stream_cancelled_while_waiting_for_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/assistant-message/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(HELLO_STREAM, NDJSON)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut count = 0;
        let outcome = client
            .stream_assistant_message("slow", &cancel, &mut |_| count += 1)
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Aborted);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_stream_network_error() {
        let config = ClientConfig {
            // Port 9 (discard) on loopback is closed on test hosts
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        };
        let client = ChatApiClient::new(&config).unwrap();
        let cancel = CancellationToken::new();
        let err = client
            .stream_assistant_message("c1", &cancel, &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_fetch_messages_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/c1/messages"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "historyMessages": [
                    {"role": "User", "content": "q"},
                    {"role": "Assistant", "content": "a", "completionTokens": 7}
                ],
                "model": "m",
                "maxOutputTokens": 100,
                "isWebSearchMode": false,
                "totalPromptTokens": 1,
                "totalCompletionTokens": 7
            })))
            .mount(&server)
            .await;

        let page = client_for(&server).fetch_messages_page("c1", 1).await.unwrap();
        assert_eq!(page.history_messages.len(), 2);
        assert_eq!(page.history_messages[1].role, Role::Assistant);
        assert_eq!(page.history_messages[1].completion_tokens, Some(7));
    }

    #[tokio::test]
    async fn test_fetch_messages_page_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/c1/messages"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_messages_page("c1", 0)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_fetch_messages_page_bad_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/c1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_messages_page("c1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }

    #[tokio::test]
    async fn test_send_user_message_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/send-user-message"))
            .and(body_string_contains("name=\"content\""))
            .and(body_string_contains("hello there"))
            .and(body_string_contains("name=\"maxOutputTokens\""))
            .and(body_string_contains("name=\"isWebSearchMode\""))
            .and(body_string_contains("name=\"chatId\""))
            .and(body_string_contains("name=\"file\"; filename=\"note.txt\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"chatId": "c9", "isNew": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::TempDir::new().unwrap();
        let attachment = temp.path().join("note.txt");
        std::fs::write(&attachment, "attached").unwrap();

        let mut message = SendMessage::new("hello there", 256);
        message.chat_id = Some("c9".to_string());
        message.file = Some(attachment);

        let response = client_for(&server)
            .send_user_message(&message)
            .await
            .unwrap();
        assert_eq!(
            response,
            SendMessageResponse {
                chat_id: "c9".to_string(),
                is_new: false,
            }
        );
    }

    #[tokio::test]
    async fn test_send_user_message_missing_attachment() {
        let server = MockServer::start().await;
        let mut message = SendMessage::new("hi", 256);
        message.file = Some("/definitely/not/here.bin".into());

        let err = client_for(&server)
            .send_user_message(&message)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Attachment { .. }));
    }

    #[tokio::test]
    async fn test_settings_patches() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/chat/c1/toggle-web-search-mode"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/chat/c1/change-max-output-tokens"))
            .and(body_json(serde_json::json!({"maxOutputTokens": 2048})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.toggle_web_search_mode("c1").await.unwrap();
        client.change_max_output_tokens("c1", 2048).await.unwrap();
    }
}
