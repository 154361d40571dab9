//! Configuration for the Ollama client

use flowgraph_core::DEFAULT_MODEL;
use std::time::Duration;

/// Connection settings for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the server, without a trailing slash
    pub base_url: String,
    /// Default model for requests that do not name one
    pub model: String,
    /// Per-request timeout, covering the whole streamed response
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl OllamaConfig {
    /// Create a config for `base_url` and `model` with the default timeout
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_local_server() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder() {
        let config = OllamaConfig::new("http://192.168.1.50:11434", "mistral")
            .with_timeout(Duration::from_secs(30));
        assert_eq!(config.base_url, "http://192.168.1.50:11434");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
