//! Error types for workflow execution
//!
//! All errors implement `std::error::Error` via the `thiserror` crate.
//! Only a subset of these is fatal to a run: `MissingEntryPoint`,
//! `Validation` and `NodeExecution` abort traversal, while provider
//! failures are absorbed by the AI-prompt handler (the node falls back
//! to a placeholder response and the run continues).

use thiserror::Error;

/// Convenience result type using [`FlowError`]
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while validating or executing a workflow
#[derive(Error, Debug)]
pub enum FlowError {
    /// The workflow contains no `input` node to start traversal from
    ///
    /// Surfaced in [`ExecutionResult`](crate::ExecutionResult) with
    /// `success = false` and whatever logs were produced before the check.
    #[error("workflow has no input node to start from")]
    MissingEntryPoint,

    /// Workflow structure is invalid
    ///
    /// **Common causes**:
    /// - An edge references a node id that does not exist
    /// - More than one `input` node (ambiguous traversal root)
    #[error("workflow validation failed: {0}")]
    Validation(String),

    /// A node handler failed with context
    ///
    /// Fatal: aborts the remaining traversal. The error is captured by
    /// the engine's outer handler and reported in the execution result.
    #[error("node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Id of the node that failed
        node: String,
        /// Error message from the handler
        error: String,
    },

    /// The language-model backend is not reachable
    ///
    /// Recovered by the AI-prompt handler: the node stores a fallback
    /// response and the run continues.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The language-model backend returned an error
    ///
    /// Recovered the same way as [`FlowError::ProviderUnavailable`].
    #[error("provider error: {0}")]
    Provider(String),

    /// JSON serialization/deserialization failed
    ///
    /// Deserializing a workflow with an unrecognized node `type` lands
    /// here, which makes unknown node types fail before traversal starts.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Create a [`FlowError::NodeExecution`] with context
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        FlowError::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Whether the AI-prompt handler recovers from this error locally
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FlowError::ProviderUnavailable(_) | FlowError::Provider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_execution_display() {
        let err = FlowError::node_execution("ai-1", "connection reset");
        assert_eq!(
            format!("{}", err),
            "node 'ai-1' execution failed: connection reset"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(FlowError::Provider("boom".into()).is_recoverable());
        assert!(FlowError::ProviderUnavailable("down".into()).is_recoverable());
        assert!(!FlowError::MissingEntryPoint.is_recoverable());
        assert!(!FlowError::node_execution("n", "e").is_recoverable());
    }
}
