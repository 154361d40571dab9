//! # flowgraph-llm - Ollama backend for flowgraph
//!
//! Implements the [`ChatModel`] trait from `flowgraph-core` against a
//! local Ollama server, so AI-prompt nodes can stream completions from
//! locally hosted models.
//!
//! - [`OllamaClient`] - streaming chat client (`/api/chat`), health probe
//!   (`/api/version`) and model listing (`/api/tags`)
//! - [`OllamaConfig`] - server URL, default model and request timeout
//! - [`LlmError`] - HTTP and API errors, convertible into the engine's
//!   error type so provider failures classify as recoverable
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowgraph_core::WorkflowEngine;
//! use flowgraph_llm::OllamaClient;
//! use std::sync::Arc;
//!
//! let engine = WorkflowEngine::new(workflow, Arc::new(OllamaClient::default()));
//! ```
//!
//! [`ChatModel`]: flowgraph_core::ChatModel

pub mod config;
pub mod error;
pub mod ollama;

pub use config::OllamaConfig;
pub use error::{LlmError, Result};
pub use ollama::{ModelInfo, OllamaClient};
