//! Ollama client implementation
//!
//! Talks to a local Ollama server over its HTTP API: `/api/chat` with
//! `stream: true` for token-by-token completions (one JSON object per
//! line), `/api/version` as the health probe, and `/api/tags` for the
//! installed model list.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_llm::{OllamaClient, OllamaConfig};
//! use flowgraph_core::llm::{ChatMessage, ChatModel, ChatRequest};
//! use futures::StreamExt;
//!
//! let client = OllamaClient::new(OllamaConfig::default());
//! let request = ChatRequest::new("llama3.2:latest", vec![ChatMessage::user("Hello!")]);
//!
//! let mut stream = client.chat_stream(request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content);
//! }
//! ```

use crate::config::OllamaConfig;
use crate::error::{LlmError, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use flowgraph_core::error::Result as FlowResult;
use flowgraph_core::llm::{ChatChunk, ChatModel, ChatRequest, ChatStream};
use flowgraph_core::FlowError;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for a local Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a client with the given configuration
    pub fn new(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    /// Check whether the server answers its version endpoint
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/version", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Fetch the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(LlmError::Api {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(tags.models)
    }

    fn chat_body(&self, request: &ChatRequest) -> OllamaChatRequest {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };
        OllamaChatRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: match m.role {
                        flowgraph_core::ChatRole::System => "system",
                        flowgraph_core::ChatRole::User => "user",
                        flowgraph_core::ChatRole::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
            options: OllamaOptions {
                temperature: request.options.temperature,
                num_predict: request.options.num_predict,
            },
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(OllamaConfig::default())
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat_stream(&self, request: ChatRequest) -> FlowResult<ChatStream> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = self.chat_body(&request);
        tracing::debug!(model = %body.model, "starting Ollama chat stream");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::from(LlmError::Http(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message }.into());
        }

        let mut bytes = response.bytes_stream();
        let stream = try_stream! {
            // The body is NDJSON: one complete JSON object per line
            let mut pending = String::new();
            let mut finished = false;
            while !finished {
                let Some(chunk) = bytes.next().await else { break };
                let chunk = chunk.map_err(|e| FlowError::from(LlmError::Http(e)))?;
                pending.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let parsed: StreamResponse = serde_json::from_str(line)
                        .map_err(|e| FlowError::from(LlmError::InvalidResponse(e.to_string())))?;
                    finished = parsed.done;
                    yield ChatChunk {
                        content: parsed.message.map(|m| m.content).unwrap_or_default(),
                        done: parsed.done,
                        eval_count: parsed.eval_count,
                        prompt_eval_count: parsed.prompt_eval_count,
                        total_duration: parsed.total_duration,
                    };
                    if finished {
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn is_available(&self) -> bool {
        self.check_health().await
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

/// One installed model as reported by `/api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model name with tag, e.g. `llama3.2:latest`
    pub name: String,
    /// On-disk size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Last-modified timestamp
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::llm::ChatMessage;

    #[test]
    fn test_client_creation() {
        let _client = OllamaClient::new(OllamaConfig::default());
    }

    #[test]
    fn test_chat_body_serialization() {
        let client = OllamaClient::new(OllamaConfig::default());
        let request = ChatRequest::new("mistral", vec![ChatMessage::user("Hello")])
            .with_temperature(0.5)
            .with_num_predict(100);

        let body = client.chat_body(&request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "mistral");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["options"]["temperature"], 0.5);
        assert_eq!(json["options"]["num_predict"], 100);
    }

    #[test]
    fn test_chat_body_falls_back_to_config_model() {
        let client = OllamaClient::new(OllamaConfig::new("http://localhost:11434", "phi3"));
        let request = ChatRequest::new("", vec![ChatMessage::user("hi")]);

        let body = client.chat_body(&request);
        assert_eq!(body.model, "phi3");
    }

    #[test]
    fn test_chat_body_omits_unset_options() {
        let client = OllamaClient::new(OllamaConfig::default());
        let request = ChatRequest::new("llama3.2:latest", vec![ChatMessage::user("hi")]);

        let json = serde_json::to_value(client.chat_body(&request)).unwrap();
        assert_eq!(json["options"], serde_json::json!({}));
    }

    #[test]
    fn test_stream_line_parsing() {
        let line = r#"{"model":"llama3.2:latest","created_at":"2024-01-01T00:00:00Z","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let parsed: StreamResponse = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.message.unwrap().content, "Hel");
        assert!(!parsed.done);
    }

    #[test]
    fn test_final_stream_line_parsing() {
        let line = r#"{"model":"llama3.2:latest","created_at":"2024-01-01T00:00:01Z","message":{"role":"assistant","content":""},"done":true,"total_duration":1500000000,"eval_count":25,"prompt_eval_count":10}"#;
        let parsed: StreamResponse = serde_json::from_str(line).unwrap();
        assert!(parsed.done);
        assert_eq!(parsed.eval_count, Some(25));
        assert_eq!(parsed.prompt_eval_count, Some(10));
        assert_eq!(parsed.total_duration, Some(1500000000));
    }

    #[test]
    fn test_tags_response_parsing() {
        let body = r#"{"models":[{"name":"llama3.2:latest","size":2019393189,"modified_at":"2024-06-01T12:00:00Z"},{"name":"mistral:latest"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tags.models.len(), 2);
        assert_eq!(tags.models[0].name, "llama3.2:latest");
        assert_eq!(tags.models[0].size, Some(2019393189));
        assert!(tags.models[1].size.is_none());
    }

    /// Requires a running Ollama server.
    #[tokio::test]
    #[ignore]
    async fn test_health_check() {
        let client = OllamaClient::default();
        let healthy = client.check_health().await;
        println!("Ollama health: {}", healthy);
    }

    /// Requires a running Ollama server with at least one model installed.
    #[tokio::test]
    #[ignore]
    async fn test_list_models() {
        let client = OllamaClient::default();
        let models = client.list_models().await.unwrap();
        assert!(!models.is_empty());
        for model in models {
            println!("Model: {}", model.name);
        }
    }

    /// Requires a running Ollama server.
    #[tokio::test]
    #[ignore]
    async fn test_streaming_completion() {
        use futures::StreamExt;

        let client = OllamaClient::default();
        let request = ChatRequest::new(
            "llama3.2:latest",
            vec![ChatMessage::user("Count to 3, digits only")],
        );

        let mut stream = client.chat_stream(request).await.unwrap();
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.content);
            if chunk.done {
                break;
            }
        }
        assert!(!text.is_empty());
    }
}
