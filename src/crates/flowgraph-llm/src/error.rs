//! Error types for the Ollama client

use flowgraph_core::FlowError;
use thiserror::Error;

/// Convenience result type using [`LlmError`]
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors from talking to the Ollama HTTP API
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure (connection refused, timeout, DNS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Ollama API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, when readable
        message: String,
    },

    /// The response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The server is not running or not reachable
    #[error("Ollama server unavailable at {0}")]
    Unavailable(String),
}

impl From<LlmError> for FlowError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(e) if e.is_connect() || e.is_timeout() => {
                FlowError::ProviderUnavailable(e.to_string())
            }
            LlmError::Unavailable(url) => {
                FlowError::ProviderUnavailable(format!("Ollama server unavailable at {}", url))
            }
            other => FlowError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = LlmError::Api {
            status: 404,
            message: "model not found".to_string(),
        };
        assert_eq!(format!("{}", err), "Ollama API error 404: model not found");
    }

    #[test]
    fn test_unavailable_maps_to_provider_unavailable() {
        let err: FlowError = LlmError::Unavailable("http://localhost:11434".to_string()).into();
        assert!(matches!(err, FlowError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_invalid_response_maps_to_provider() {
        let err: FlowError = LlmError::InvalidResponse("bad json".to_string()).into();
        assert!(matches!(err, FlowError::Provider(_)));
    }
}
