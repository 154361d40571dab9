//! Client trait and request types for language-model backends
//!
//! The engine is an orchestrator, not an LLM client library: this module
//! defines the trait the AI-prompt handler consumes, and provider crates
//! implement it (see `flowgraph-llm` for the Ollama implementation).
//!
//! Streaming is stream-based rather than callback-based: `chat_stream`
//! returns a [`ChatStream`] the engine drains with ordinary `.next().await`.
//! Chunks arrive in generation order and the final chunk carries
//! `done = true` plus usage counters when the backend reports them.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use flowgraph_core::llm::{ChatModel, ChatRequest, ChatStream};
//! use async_trait::async_trait;
//!
//! #[derive(Clone)]
//! struct MyClient;
//!
//! #[async_trait]
//! impl ChatModel for MyClient {
//!     async fn chat_stream(&self, request: ChatRequest) -> flowgraph_core::Result<ChatStream> {
//!         // POST to the backend, decode its stream into ChatChunk items
//!         todo!()
//!     }
//!
//!     async fn is_available(&self) -> bool {
//!         true
//!     }
//!
//!     fn clone_box(&self) -> Box<dyn ChatModel> {
//!         Box::new(self.clone())
//!     }
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of completion chunks; mid-stream failures surface as `Err` items
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction
    System,
    /// End-user message
    User,
    /// Model response
    Assistant,
}

/// One message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// A chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation so far
    pub messages: Vec<ChatMessage>,
    /// Sampling options
    #[serde(default)]
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Create a request for `model` with the given messages
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: ChatOptions::default(),
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Set the generation budget
    pub fn with_num_predict(mut self, num_predict: u32) -> Self {
        self.options.num_predict = Some(num_predict);
        self
    }
}

/// One chunk of a streamed completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Token or partial text for this chunk
    pub content: String,
    /// Whether this is the final chunk
    pub done: bool,
    /// Tokens generated, reported on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    /// Prompt tokens consumed, reported on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Total backend-side duration in nanoseconds, on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
}

impl ChatChunk {
    /// An intermediate chunk carrying text only
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            eval_count: None,
            prompt_eval_count: None,
            total_duration: None,
        }
    }

    /// The final chunk of a stream
    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
            eval_count: None,
            prompt_eval_count: None,
            total_duration: None,
        }
    }
}

/// Chat-based language model consumed by the AI-prompt handler
///
/// Implementations must be `Send + Sync`; the engine holds the client as
/// `Arc<dyn ChatModel>` for the lifetime of a run.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream a completion token by token
    ///
    /// # Errors
    ///
    /// Backend failures (connection refused, HTTP errors, malformed
    /// responses) should surface as [`FlowError::Provider`] either from
    /// this method or as `Err` items mid-stream. The engine recovers from
    /// both by substituting a fallback response.
    ///
    /// [`FlowError::Provider`]: crate::FlowError::Provider
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Whether the backend is reachable and healthy
    ///
    /// Probed before each completion; an unavailable backend makes the
    /// AI-prompt handler fall back without attempting the call.
    async fn is_available(&self) -> bool;

    /// Clone this model into a boxed trait object
    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[derive(Clone)]
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
            let text = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let chunks = vec![Ok(ChatChunk::text(text)), Ok(ChatChunk::done())];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::new("llama3.2:latest", vec![ChatMessage::user("hi")])
            .with_temperature(0.2)
            .with_num_predict(64);

        assert_eq!(request.model, "llama3.2:latest");
        assert_eq!(request.options.temperature, Some(0.2));
        assert_eq!(request.options.num_predict, Some(64));
        assert_eq!(request.messages[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn test_trait_object_streaming() {
        let model: Box<dyn ChatModel> = Box::new(EchoModel);
        let request = ChatRequest::new("test", vec![ChatMessage::user("hello")]);

        let mut stream = model.chat_stream(request).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, "hello");
        assert!(!first.done);

        let last = stream.next().await.unwrap().unwrap();
        assert!(last.done);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_options_serialization_skips_unset() {
        let options = ChatOptions::default();
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
