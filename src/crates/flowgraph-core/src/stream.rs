//! Out-of-band observability for running workflows
//!
//! Two channels exist side by side: a per-node progress callback
//! (`executing` / `completed` / `error`) for coarse UI state, and an
//! [`ExecutionEvent`] channel carrying token-level deltas from AI-prompt
//! nodes. Both are optional and neither affects control flow: events are
//! pushed while the engine awaits the completion stream, and a dropped
//! receiver is ignored.

use crate::workflow::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Coarse per-node lifecycle status reported through the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Handler started
    Executing,
    /// Handler finished successfully
    Completed,
    /// Handler failed (the run aborts after this report)
    Error,
}

impl NodeStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Executing => "executing",
            NodeStatus::Completed => "completed",
            NodeStatus::Error => "error",
        }
    }
}

/// Per-node progress callback
pub type ProgressCallback = Arc<dyn Fn(&str, NodeStatus) + Send + Sync>;

/// Token-level events emitted by AI-prompt nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// One streamed chunk, with the text accumulated so far
    AiChunk {
        /// Node that produced the chunk
        node_id: NodeId,
        /// Delta for this chunk
        chunk: String,
        /// Full text accumulated up to and including this chunk
        full_text: String,
        /// Whether this was the final chunk
        done: bool,
    },
    /// The completion failed; the node continues with a fallback response
    AiError {
        /// Node whose completion failed
        node_id: NodeId,
        /// Failure description
        error: String,
        /// Always true: an error terminates the node's stream
        done: bool,
    },
}

/// Sender half of the event channel handed to the engine
pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Create an event channel, returning the sender for the engine and the
/// receiving end as a `Stream` for the consumer
pub fn event_channel() -> (EventSender, UnboundedReceiverStream<ExecutionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, UnboundedReceiverStream::new(rx))
}

/// Accumulates streamed tokens into the full completion text
#[derive(Debug, Default)]
pub struct TokenBuffer {
    buffer: String,
    chunk_count: usize,
    finished: bool,
}

impl TokenBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        self.chunk_count += 1;
    }

    /// Mark the stream as complete
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.buffer
    }

    /// Number of chunks received
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether the final chunk arrived
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the buffer, returning the complete text
    pub fn into_string(self) -> String {
        self.buffer
    }
}
