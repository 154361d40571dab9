//! Workflow execution engine
//!
//! The engine walks the workflow graph depth-first from its single input
//! node, strictly sequentially: siblings reached from the same node run
//! one after another in edge order, and the only suspension point is the
//! AI-prompt handler awaiting the completion stream.
//!
//! Handlers return a [`Flow`] telling the engine who owns successor
//! dispatch: `Continue` means the engine marks the node executed and
//! follows all outgoing edges, `Handled` means the handler already marked
//! itself and chose which edges to follow (condition, switch and loop
//! nodes, which route on handles).
//!
//! Failure policy: a handler error aborts the remaining traversal and is
//! surfaced in the [`ExecutionResult`]. Provider failures and malformed
//! condition strings are recovered locally, so a flaky model call never
//! kills an otherwise-working workflow.

use crate::context::{ExecutionContext, LogLevel, Scope};
use crate::error::{FlowError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::result::ExecutionResult;
use crate::stream::{EventSender, ExecutionEvent, NodeStatus, ProgressCallback, TokenBuffer};
use crate::workflow::{
    handles, AiPromptData, ConditionData, Edge, InputData, LoopData, Node, NodeKind, TransformData,
    TransformKind, Workflow,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Model used when an AI-prompt node does not name one
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

/// Who dispatches a node's successors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Engine marks the node executed and follows all outgoing edges
    Continue,
    /// Handler marked itself and already dispatched its chosen edges
    Handled,
}

/// Single-run workflow interpreter
///
/// One engine executes one workflow definition; each [`execute`] call
/// owns an independent [`ExecutionContext`], so concurrent runs of the
/// same engine share no state.
///
/// [`execute`]: WorkflowEngine::execute
pub struct WorkflowEngine {
    workflow: Workflow,
    client: Arc<dyn ChatModel>,
    progress: Option<ProgressCallback>,
    events: Option<EventSender>,
}

impl WorkflowEngine {
    /// Create an engine for `workflow` backed by `client`
    pub fn new(workflow: Workflow, client: Arc<dyn ChatModel>) -> Self {
        Self {
            workflow,
            client,
            progress: None,
            events: None,
        }
    }

    /// Report per-node lifecycle status through `callback`
    pub fn with_progress(
        mut self,
        callback: impl Fn(&str, NodeStatus) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Forward token-level AI events to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Execute the workflow with the given input variables
    ///
    /// Never returns `Err`: fatal errors are folded into the result with
    /// `success = false` together with all outputs and logs accumulated
    /// up to the failure point.
    pub async fn execute(&self, inputs: HashMap<String, Value>) -> ExecutionResult {
        let mut ctx = ExecutionContext::new(inputs);
        tracing::info!(
            workflow = %self.workflow.id,
            run = %ctx.run_id(),
            "starting workflow execution"
        );

        let outcome = self.run(&mut ctx).await;
        let error = match outcome {
            Ok(()) => {
                ctx.log(
                    "workflow",
                    LogLevel::Success,
                    "Workflow execution completed",
                    None,
                );
                None
            }
            Err(err) => {
                tracing::error!(workflow = %self.workflow.id, error = %err, "workflow failed");
                ctx.log(
                    "workflow",
                    LogLevel::Error,
                    format!("Workflow execution failed: {}", err),
                    None,
                );
                Some(err.to_string())
            }
        };

        ExecutionResult {
            run_id: ctx.run_id(),
            success: error.is_none(),
            outputs: ctx.variables().clone(),
            logs: ctx.logs().to_vec(),
            error,
            duration_ms: ctx.duration_ms(),
        }
    }

    async fn run(&self, ctx: &mut ExecutionContext) -> Result<()> {
        self.workflow.validate()?;
        let entry = self
            .workflow
            .entry_node()
            .ok_or(FlowError::MissingEntryPoint)?;
        self.execute_node(ctx, entry, &Scope::root()).await
    }

    /// Execute one node and, depending on its [`Flow`], its successors
    ///
    /// The idempotency guard skips nodes already executed in this scope
    /// without re-running them or traversing their successors again.
    fn execute_node<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        node: &'a Node,
        scope: &'a Scope,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if ctx.has_executed(scope, &node.id) {
                tracing::warn!(node = %node.id, "node already executed in this scope, skipping");
                return Ok(());
            }

            ctx.log(
                &node.id,
                LogLevel::Info,
                format!("Executing node: {}", node.kind.name()),
                None,
            );
            self.report(&node.id, NodeStatus::Executing);

            let outcome = match &node.kind {
                NodeKind::Input(data) => self.run_input(ctx, node, data),
                NodeKind::Output(_) => self.run_output(ctx, node),
                NodeKind::Transform(data) => self.run_transform(ctx, node, data),
                NodeKind::AiPrompt(data) => self.run_ai_prompt(ctx, node, data).await,
                NodeKind::Condition(data) => self.run_condition(ctx, node, data, scope).await,
                NodeKind::Switch(_) => self.run_switch(ctx, node, scope).await,
                NodeKind::Loop(data) => self.run_loop(ctx, node, data, scope).await,
            };

            match outcome {
                Ok(Flow::Continue) => {
                    ctx.mark_executed(scope, &node.id);
                    ctx.log(&node.id, LogLevel::Success, "Node executed", None);
                    self.report(&node.id, NodeStatus::Completed);
                    self.execute_next(ctx, node, None, scope).await
                }
                Ok(Flow::Handled) => {
                    ctx.log(&node.id, LogLevel::Success, "Node executed", None);
                    self.report(&node.id, NodeStatus::Completed);
                    Ok(())
                }
                Err(err) => {
                    ctx.log(
                        &node.id,
                        LogLevel::Error,
                        format!("Node execution failed: {}", err),
                        None,
                    );
                    self.report(&node.id, NodeStatus::Error);
                    // Attach the failing node's id once; errors bubbling up
                    // through branching handlers keep the innermost context
                    Err(match err {
                        wrapped @ FlowError::NodeExecution { .. } => wrapped,
                        other => FlowError::node_execution(&node.id, other.to_string()),
                    })
                }
            }
        })
    }

    /// Follow outgoing edges of `node`, optionally filtered by handle
    async fn execute_next(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        handle: Option<&str>,
        scope: &Scope,
    ) -> Result<()> {
        let edges: Vec<&Edge> = match handle {
            Some(h) => self.workflow.outgoing_with_handle(&node.id, h),
            None => self.workflow.outgoing(&node.id).collect(),
        };
        self.execute_edges(ctx, &edges, scope).await
    }

    /// Execute each edge's target subtree sequentially, in edge order
    async fn execute_edges(
        &self,
        ctx: &mut ExecutionContext,
        edges: &[&Edge],
        scope: &Scope,
    ) -> Result<()> {
        for edge in edges {
            if let Some(target) = self.workflow.node(&edge.target) {
                self.execute_node(ctx, target, scope).await?;
            }
        }
        Ok(())
    }

    fn run_input(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        data: &InputData,
    ) -> Result<Flow> {
        // Caller-supplied input wins, then the static default, then the label
        let value = match ctx.variable("input") {
            Some(existing) => existing.clone(),
            None => data
                .value
                .clone()
                .or_else(|| data.label.clone().map(Value::String))
                .unwrap_or_else(|| Value::String(String::new())),
        };

        ctx.set_variable("input", value.clone());
        ctx.set_variable(format!("input_{}", node.id), value.clone());
        ctx.set_variable("lastValue", value);
        Ok(Flow::Continue)
    }

    fn run_output(&self, ctx: &mut ExecutionContext, node: &Node) -> Result<Flow> {
        let value = ctx.variable("lastValue").cloned().unwrap_or(Value::Null);
        ctx.set_variable(format!("output_{}", node.id), value.clone());
        ctx.set_variable("output", value.clone());
        ctx.log(
            &node.id,
            LogLevel::Info,
            "Output captured",
            Some(json!({ "value": value })),
        );
        Ok(Flow::Continue)
    }

    async fn run_ai_prompt(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        data: &AiPromptData,
    ) -> Result<Flow> {
        let prompt = ctx.interpolate(&data.prompt_template);
        ctx.log(
            &node.id,
            LogLevel::Info,
            "AI prompt node",
            Some(json!({
                "template": data.prompt_template,
                "interpolated": prompt,
            })),
        );

        let mut request = ChatRequest::new(
            data.model.as_deref().unwrap_or(DEFAULT_MODEL),
            vec![ChatMessage::user(&prompt)],
        );
        if let Some(temperature) = data.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = data.max_tokens {
            request = request.with_num_predict(max_tokens);
        }

        // Provider failures never abort the run: fall back and continue.
        // Anything else from the stream is fatal like any handler error.
        let text = match self.stream_completion(&node.id, request).await {
            Ok(text) => text,
            Err(err) if err.is_recoverable() => {
                tracing::warn!(node = %node.id, error = %err, "completion failed, using fallback");
                ctx.log(
                    &node.id,
                    LogLevel::Error,
                    format!("AI request failed: {}", err),
                    None,
                );
                self.emit(ExecutionEvent::AiError {
                    node_id: node.id.clone(),
                    error: err.to_string(),
                    done: true,
                });
                format!("[AI Error: {}] - Fallback response for: {}", err, prompt)
            }
            Err(err) => return Err(err),
        };

        ctx.set_variable(format!("ai_{}", node.id), Value::String(text.clone()));
        ctx.set_variable("lastValue", Value::String(text));
        Ok(Flow::Continue)
    }

    /// Drain the completion stream, forwarding each chunk out-of-band
    async fn stream_completion(&self, node_id: &str, request: ChatRequest) -> Result<String> {
        if !self.client.is_available().await {
            return Err(FlowError::ProviderUnavailable(
                "language model backend is not reachable".to_string(),
            ));
        }

        let mut stream = self.client.chat_stream(request).await?;
        let mut buffer = TokenBuffer::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                buffer.push(&chunk.content);
            }
            self.emit(ExecutionEvent::AiChunk {
                node_id: node_id.to_string(),
                chunk: chunk.content,
                full_text: buffer.content().to_string(),
                done: chunk.done,
            });
            if chunk.done {
                buffer.finish();
                break;
            }
        }
        Ok(buffer.into_string())
    }

    async fn run_condition(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        data: &ConditionData,
        scope: &Scope,
    ) -> Result<Flow> {
        let result = ctx.evaluate_condition(&data.condition);
        ctx.log(
            &node.id,
            LogLevel::Info,
            format!("Condition evaluated: {} = {}", data.condition, result),
            None,
        );
        ctx.set_variable(format!("condition_{}", node.id), Value::Bool(result));
        ctx.set_variable("lastValue", Value::Bool(result));

        // Mark before branching so cyclic graphs cannot re-enter this node
        ctx.mark_executed(scope, &node.id);
        let handle = if result { handles::YES } else { handles::NO };
        self.execute_next(ctx, node, Some(handle), scope).await?;
        Ok(Flow::Handled)
    }

    async fn run_switch(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        scope: &Scope,
    ) -> Result<Flow> {
        let value = ctx.variable("lastValue").cloned().unwrap_or(Value::Null);
        let handle = switch_repr(&value);
        ctx.log(
            &node.id,
            LogLevel::Info,
            format!("Switch on value: {}", handle),
            None,
        );
        ctx.set_variable(format!("switch_{}", node.id), value);
        ctx.mark_executed(scope, &node.id);

        let matched = self.workflow.outgoing_with_handle(&node.id, &handle);
        let edges = if matched.is_empty() {
            self.workflow
                .outgoing_with_handle(&node.id, handles::DEFAULT)
        } else {
            matched
        };
        // No matching case and no default: no successor runs
        self.execute_edges(ctx, &edges, scope).await?;
        Ok(Flow::Handled)
    }

    async fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        data: &LoopData,
        scope: &Scope,
    ) -> Result<Flow> {
        ctx.mark_executed(scope, &node.id);

        let body: Vec<&Edge> = {
            let tagged = self.workflow.outgoing_with_handle(&node.id, handles::BODY);
            if tagged.is_empty() {
                // Untagged graphs: everything that is not an exit is body
                self.workflow
                    .outgoing(&node.id)
                    .filter(|e| !e.source_handle.as_deref().is_some_and(handles::is_exit))
                    .collect()
            } else {
                tagged
            }
        };
        let exits: Vec<&Edge> = self
            .workflow
            .outgoing(&node.id)
            .filter(|e| e.source_handle.as_deref().is_some_and(handles::is_exit))
            .collect();

        let count = data.count();
        ctx.log(
            &node.id,
            LogLevel::Info,
            format!("Loop node: {} iterations", count),
            None,
        );

        let mut results = Vec::with_capacity(count as usize);
        for i in 0..count {
            ctx.set_variable("loopIndex", json!(i));
            ctx.set_variable("loopCount", json!(count));
            ctx.set_variable("loopIteration", json!(i + 1));

            // Fresh scope per iteration lets body nodes re-execute
            let iteration = scope.enter(node.id.clone(), i);
            self.execute_edges(ctx, &body, &iteration).await?;

            results.push(ctx.variable("lastValue").cloned().unwrap_or(Value::Null));
        }

        let results = Value::Array(results);
        ctx.set_variable(format!("loop_{}", node.id), results.clone());
        ctx.set_variable("loopResults", results.clone());
        ctx.set_variable("lastValue", results);

        // Exit edges run exactly once, after all iterations
        self.execute_edges(ctx, &exits, scope).await?;
        Ok(Flow::Handled)
    }

    fn run_transform(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        data: &TransformData,
    ) -> Result<Flow> {
        let last = ctx.variable("lastValue").cloned().unwrap_or(Value::Null);
        ctx.log(
            &node.id,
            LogLevel::Info,
            format!("Transform: {:?}", data.transform_type),
            None,
        );

        let result = match data.transform_type {
            TransformKind::Format => Value::String(serde_json::to_string_pretty(&last)?),
            TransformKind::Extract => {
                if last.is_object() {
                    last
                } else {
                    json!({ "value": last })
                }
            }
            TransformKind::Merge => {
                let mut merged: serde_json::Map<String, Value> = ctx
                    .variables()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                merged.insert("transformed".to_string(), last);
                Value::Object(merged)
            }
            TransformKind::Passthrough => last,
        };

        ctx.set_variable(format!("transform_{}", node.id), result.clone());
        ctx.set_variable("lastValue", result);
        Ok(Flow::Continue)
    }

    fn report(&self, node_id: &str, status: NodeStatus) {
        if let Some(callback) = &self.progress {
            callback(node_id, status);
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(sender) = &self.events {
            // Receiver may be gone; events are advisory only
            let _ = sender.send(event);
        }
    }
}

/// String form of a value used for switch-case matching
fn switch_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_repr() {
        assert_eq!(switch_repr(&json!("case1")), "case1");
        assert_eq!(switch_repr(&json!(3)), "3");
        assert_eq!(switch_repr(&json!(true)), "true");
        assert_eq!(switch_repr(&Value::Null), "null");
        assert_eq!(switch_repr(&json!(["a"])), "[\"a\"]");
    }
}
