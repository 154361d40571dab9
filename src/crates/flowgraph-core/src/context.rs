//! Per-run mutable execution state
//!
//! An [`ExecutionContext`] is created once per `execute()` call, owned
//! exclusively by that call, and discarded when the run ends. It holds the
//! variable store, the append-only execution log, and the executed-node
//! set that guards against re-entering nodes.
//!
//! The executed-node set is keyed by `(scope, node id)` rather than node
//! id alone: each loop iteration runs its body under a fresh child
//! [`Scope`], so body nodes re-execute across iterations without any
//! explicit unmark step, and a node reachable through two paths inside
//! one iteration still executes only once.

use crate::result::ExecutionSummary;
use crate::template;
use crate::workflow::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

/// Severity of an execution log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Informational progress
    Info,
    /// Unexpected but non-fatal situation
    Warning,
    /// A failure, recovered or fatal
    Error,
    /// Successful completion of a step
    Success,
}

/// One entry in the append-only execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Node that produced the entry (`"workflow"` for run-level events)
    pub node_id: NodeId,
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Human-readable message
    pub message: String,
    /// Optional structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Identifies where in the loop-iteration hierarchy a node executes
///
/// The root scope is empty; entering iteration `i` of a loop node pushes
/// one frame. Two executions of the same node in different scopes are
/// independent for the idempotency guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Scope(Vec<ScopeFrame>);

/// One level of loop nesting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeFrame {
    /// Loop node owning the iteration
    pub node: NodeId,
    /// Zero-based iteration index
    pub iteration: u32,
}

impl Scope {
    /// The top-level scope of a run
    pub fn root() -> Self {
        Scope(Vec::new())
    }

    /// Child scope for one iteration of a loop node
    pub fn enter(&self, node: impl Into<NodeId>, iteration: u32) -> Self {
        let mut frames = self.0.clone();
        frames.push(ScopeFrame {
            node: node.into(),
            iteration,
        });
        Scope(frames)
    }

    /// Nesting depth (0 at the root)
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// Mutable state shared by all node handlers within one run
pub struct ExecutionContext {
    run_id: Uuid,
    variables: HashMap<String, Value>,
    logs: Vec<LogEntry>,
    executed: HashMap<Scope, HashSet<NodeId>>,
    started: Instant,
}

impl ExecutionContext {
    /// Create a context seeded with the caller's input variables
    pub fn new(inputs: HashMap<String, Value>) -> Self {
        let mut ctx = Self {
            run_id: Uuid::new_v4(),
            variables: HashMap::new(),
            logs: Vec::new(),
            executed: HashMap::new(),
            started: Instant::now(),
        };
        let seed = inputs.clone();
        for (key, value) in inputs {
            ctx.variables.insert(key, value);
        }
        ctx.log(
            "workflow",
            LogLevel::Info,
            "Workflow execution started",
            Some(Value::Object(seed.into_iter().collect())),
        );
        ctx
    }

    /// Unique id of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Set a variable, replacing any previous value
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Current value of a variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Whether a variable is set
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Snapshot of the whole variable map
    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// Append one log entry; never fails
    pub fn log(
        &mut self,
        node_id: impl Into<NodeId>,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        self.logs.push(LogEntry {
            node_id: node_id.into(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
        });
    }

    /// All log entries, in append order
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Record that `node` executed within `scope`
    pub fn mark_executed(&mut self, scope: &Scope, node: &str) {
        self.executed
            .entry(scope.clone())
            .or_default()
            .insert(node.to_string());
    }

    /// Whether `node` already executed within `scope`
    pub fn has_executed(&self, scope: &Scope, node: &str) -> bool {
        self.executed
            .get(scope)
            .is_some_and(|nodes| nodes.contains(node))
    }

    /// Distinct node ids that executed at least once, sorted
    pub fn executed_nodes(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .executed
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Replace every `{{name}}` token with the variable's formatted value
    ///
    /// Pure and total: unresolvable tokens are left literal.
    pub fn interpolate(&self, template: &str) -> String {
        template::interpolate(&self.variables, template)
    }

    /// Evaluate a boolean expression against the variable store
    ///
    /// Interpolates first, then compares. Malformed expressions are logged
    /// at error level and evaluate to `false`; this never propagates.
    pub fn evaluate_condition(&mut self, condition: &str) -> bool {
        let interpolated = self.interpolate(condition);
        match template::evaluate_condition(&interpolated) {
            Ok(result) => result,
            Err(reason) => {
                self.log(
                    "condition",
                    LogLevel::Error,
                    format!("Error evaluating condition: {}", condition),
                    Some(serde_json::json!({ "reason": reason })),
                );
                false
            }
        }
    }

    /// Wall-clock time elapsed since the context was created
    pub fn duration_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Aggregate view of the run derived from the log and executed set
    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            duration_ms: self.duration_ms(),
            nodes_executed: self.executed_nodes().len(),
            errors: self
                .logs
                .iter()
                .filter(|entry| entry.level == LogLevel::Error)
                .count(),
            warnings: self
                .logs
                .iter()
                .filter(|entry| entry.level == LogLevel::Warning)
                .count(),
        }
    }
}
