//! # flowgraph-core - Workflow Graph Execution Engine
//!
//! **Interpreter for editor-authored workflow graphs** - Execute directed
//! graphs of typed nodes (input, AI prompt, condition, loop, transform,
//! switch, output) against a shared variable context, with streaming
//! tokens from a pluggable language-model backend.
//!
//! ## Overview
//!
//! `flowgraph-core` is the runtime half of a visual workflow editor: the
//! editor produces a JSON graph, this crate walks it. It provides:
//!
//! - **Typed node payloads** - The editor's `{id, type, data}` JSON maps
//!   onto a tagged enum, so malformed definitions fail at load time
//! - **Sequential traversal** - Depth-first from the single input node,
//!   siblings in edge order, with a scope-keyed idempotency guard so
//!   diamond joins execute once and loop bodies re-execute per iteration
//! - **Handle-based routing** - Condition (`yes`/`no`), switch (case
//!   labels with `default` fallback) and loop (`body`/exit) nodes select
//!   successors by edge handle
//! - **Streaming AI nodes** - Prompt templates interpolated from the
//!   variable store, completions drained token by token, with a fallback
//!   response when the backend is unreachable
//! - **Observability** - An append-only execution log, per-node progress
//!   callbacks and an out-of-band token event channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowgraph_core::{Workflow, WorkflowEngine};
//! use flowgraph_llm::OllamaClient;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let workflow: Workflow = serde_json::from_str(&definition).unwrap();
//!     let engine = WorkflowEngine::new(workflow, Arc::new(OllamaClient::default()));
//!
//!     let mut inputs = HashMap::new();
//!     inputs.insert("input".to_string(), serde_json::json!("What is Rust?"));
//!
//!     let result = engine.execute(inputs).await;
//!     if result.success {
//!         println!("{:?}", result.output());
//!     }
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`workflow`] - Graph data model: [`Workflow`], [`Node`], [`Edge`]
//! - [`engine`] - The [`WorkflowEngine`] interpreter and node handlers
//! - [`context`] - Per-run state: variables, logs, executed-node set
//! - [`llm`] - The [`ChatModel`] trait AI-prompt nodes consume
//! - [`stream`] - Progress callbacks and token-level execution events
//! - [`result`] - [`ExecutionResult`] and run summaries
//! - [`error`] - The [`FlowError`] taxonomy
//!
//! Template interpolation and condition evaluation live in a private
//! module and are exposed through [`context::ExecutionContext`].

pub mod context;
pub mod engine;
pub mod error;
pub mod llm;
pub mod result;
pub mod stream;
pub mod workflow;

mod template;

// Re-export main types
pub use context::{ExecutionContext, LogEntry, LogLevel, Scope};
pub use engine::{Flow, WorkflowEngine, DEFAULT_MODEL};
pub use error::{FlowError, Result};
pub use llm::{ChatChunk, ChatMessage, ChatModel, ChatOptions, ChatRequest, ChatRole, ChatStream};
pub use result::{ExecutionResult, ExecutionSummary};
pub use stream::{
    event_channel, EventSender, ExecutionEvent, NodeStatus, ProgressCallback, TokenBuffer,
};
pub use workflow::{Edge, Node, NodeId, NodeKind, Workflow};
