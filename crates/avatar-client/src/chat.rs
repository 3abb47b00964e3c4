//! Chat completion service
//!
//! Request: a free-text user message plus an optional system prompt.
//! Response: a free-text reply. A transport or parse failure substitutes a
//! literal fallback string — the caller never sees a hard failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Reply substituted on any chat-service failure.
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong with the AI response.";

/// Conversational reply provider.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Produce a reply to `message`. Infallible by contract: failures
    /// degrade to a fallback reply inside the implementation.
    async fn reply(&self, message: &str, system_prompt: Option<&str>) -> String;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat over an HTTP chat-completion endpoint.
pub struct HttpChatService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpChatService {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }

    async fn request(&self, message: &str, system_prompt: Option<&str>) -> Result<String, ClientError> {
        let mut messages = Vec::new();
        if let Some(prompt) = system_prompt {
            messages.push(ChatMessage { role: "system", content: prompt });
        }
        messages.push(ChatMessage { role: "user", content: message });

        let body = ChatRequest { model: &self.model, messages, stream: false };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request.send().await?.error_for_status()?.json().await?;
        if response.message.content.is_empty() {
            return Err(ClientError::Malformed("empty reply".to_string()));
        }
        Ok(response.message.content)
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn reply(&self, message: &str, system_prompt: Option<&str>) -> String {
        match self.request(message, system_prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "chat service failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Returns a fixed reply; for tests and offline runs.
pub struct FixedChatService {
    reply: String,
}

impl FixedChatService {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl ChatService for FixedChatService {
    async fn reply(&self, _message: &str, _system_prompt: Option<&str>) -> String {
        self.reply.clone()
    }
}
