//! Execution results and run summaries

use crate::context::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of one `execute()` call
///
/// Always carries whatever outputs and logs accumulated before the run
/// ended, including on failure. Recovered errors (provider fallbacks, bad
/// condition strings) appear only as error-level log entries while
/// `success` stays `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Whether traversal completed without a fatal error
    pub success: bool,
    /// Snapshot of the variable map at the end of the run
    pub outputs: HashMap<String, Value>,
    /// Full execution log, in append order
    pub logs: Vec<LogEntry>,
    /// Message of the fatal error, when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// The final `output` variable, if an output node captured one
    pub fn output(&self) -> Option<&Value> {
        self.outputs.get("output")
    }
}

/// Aggregate counters derived from the log and executed-node set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Distinct nodes that executed at least once
    pub nodes_executed: usize,
    /// Error-level log entries
    pub errors: usize,
    /// Warning-level log entries
    pub warnings: usize,
}
