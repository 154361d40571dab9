//! Workflow data model: nodes, edges and the containing graph
//!
//! A [`Workflow`] is a directed graph authored by an external editor and
//! handed to the engine as a value. Nodes carry a typed payload per kind
//! (the editor's `{id, type, data}` JSON shape maps onto an adjacently
//! tagged enum), and edges can name an outgoing port via `source_handle`,
//! which branching nodes use to select which successors to follow.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::workflow::Workflow;
//!
//! let workflow: Workflow = serde_json::from_value(serde_json::json!({
//!     "id": "wf-1",
//!     "name": "Echo",
//!     "nodes": [
//!         {"id": "1", "type": "input", "data": {"label": "Question"}},
//!         {"id": "2", "type": "output", "data": {}}
//!     ],
//!     "edges": [
//!         {"id": "e1", "source": "1", "target": "2"}
//!     ]
//! })).unwrap();
//!
//! assert!(workflow.validate().is_ok());
//! ```

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a node within a workflow
pub type NodeId = String;

/// Well-known edge handles used for branch selection
pub mod handles {
    /// Condition node: truthy branch
    pub const YES: &str = "yes";
    /// Condition node: falsy branch
    pub const NO: &str = "no";
    /// Loop node: body entry
    pub const BODY: &str = "body";
    /// Switch node: fallback branch when no case matches
    pub const DEFAULT: &str = "default";
    /// Loop node: exit paths, followed once after all iterations
    pub const EXITS: [&str; 3] = ["out", "exit", "done"];

    /// Whether a handle names a loop exit path
    pub fn is_exit(handle: &str) -> bool {
        EXITS.contains(&handle)
    }
}

/// A single node in the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the workflow
    pub id: NodeId,
    /// Node kind with its type-specific payload
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Node kind, tagged by the editor's `type` field with payload in `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NodeKind {
    /// Traversal root; seeds the `input` variable
    #[serde(rename = "input")]
    Input(InputData),
    /// Captures the current pipeline value as a final output
    #[serde(rename = "output")]
    Output(OutputData),
    /// Streams a completion from the language-model client
    #[serde(rename = "aiPrompt")]
    AiPrompt(AiPromptData),
    /// Evaluates a boolean expression and routes to `yes`/`no` edges
    #[serde(rename = "condition")]
    Condition(ConditionData),
    /// Re-executes its body a fixed number of times
    #[serde(rename = "loop")]
    Loop(LoopData),
    /// Reshapes the current pipeline value
    #[serde(rename = "transform")]
    Transform(TransformData),
    /// Routes on the string form of the current pipeline value
    #[serde(rename = "switch")]
    Switch(SwitchData),
}

impl NodeKind {
    /// Editor-facing name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Input(_) => "input",
            NodeKind::Output(_) => "output",
            NodeKind::AiPrompt(_) => "aiPrompt",
            NodeKind::Condition(_) => "condition",
            NodeKind::Loop(_) => "loop",
            NodeKind::Transform(_) => "transform",
            NodeKind::Switch(_) => "switch",
        }
    }
}

/// Payload of an `input` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputData {
    /// Display label from the editor
    pub label: Option<String>,
    /// Static default used when the caller supplies no `input` variable
    #[serde(alias = "inputValue")]
    pub value: Option<Value>,
}

/// Payload of an `output` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputData {
    /// Display label from the editor
    pub label: Option<String>,
}

/// Payload of an `aiPrompt` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AiPromptData {
    /// Display label from the editor
    pub label: Option<String>,
    /// Prompt template with `{{variable}}` tokens
    pub prompt_template: String,
    /// Model override; engine default applies when absent
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens to generate (`num_predict`)
    pub max_tokens: Option<u32>,
}

/// Payload of a `condition` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionData {
    /// Display label from the editor
    pub label: Option<String>,
    /// Boolean expression, interpolated before evaluation
    pub condition: String,
}

/// Payload of a `loop` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopData {
    /// Display label from the editor
    pub label: Option<String>,
    /// Number of iterations; defaults to [`LoopData::DEFAULT_COUNT`]
    pub loop_count: Option<u32>,
}

impl LoopData {
    /// Iteration count used when the editor left `loopCount` unset
    pub const DEFAULT_COUNT: u32 = 3;

    /// Effective iteration count
    pub fn count(&self) -> u32 {
        self.loop_count.unwrap_or(Self::DEFAULT_COUNT)
    }
}

/// Payload of a `transform` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformData {
    /// Display label from the editor
    pub label: Option<String>,
    /// Which transformation to apply
    pub transform_type: TransformKind,
}

/// Transformation applied by a `transform` node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Stringify the pipeline value as pretty-printed JSON
    Format,
    /// Wrap non-object values as `{"value": ...}`, pass objects through
    Extract,
    /// Shallow-merge all variables plus a `transformed` key
    Merge,
    /// Pass the pipeline value through unchanged (unrecognized kinds)
    #[serde(other)]
    Passthrough,
}

impl Default for TransformKind {
    fn default() -> Self {
        TransformKind::Format
    }
}

/// Payload of a `switch` node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchData {
    /// Display label from the editor
    pub label: Option<String>,
}

/// A directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique edge id
    pub id: String,
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Named outgoing port, used for branch selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Named incoming port (unused by the engine, kept for round-tripping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Display label from the editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    /// Whether this edge's source handle equals `handle`
    pub fn has_handle(&self, handle: &str) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }
}

/// A complete workflow definition: nodes plus edges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow id assigned by the editor/persistence layer
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// All nodes, ids unique within the workflow
    pub nodes: Vec<Node>,
    /// All edges, in editor order (dispatch follows this order)
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single `input` node, if exactly one exists
    pub fn entry_node(&self) -> Option<&Node> {
        let mut inputs = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Input(_)));
        match (inputs.next(), inputs.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    /// All outgoing edges of `source`, in edge order
    pub fn outgoing(&self, source: &str) -> impl Iterator<Item = &Edge> {
        // Owned key: the iterator must not borrow from `source`
        let source = source.to_owned();
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Outgoing edges of `source` whose handle equals `handle`
    pub fn outgoing_with_handle(&self, source: &str, handle: &str) -> Vec<&Edge> {
        self.outgoing(source)
            .filter(|e| e.has_handle(handle))
            .collect()
    }

    /// Validate graph structure before execution
    ///
    /// Checks that every edge references existing node ids and that the
    /// workflow has exactly one `input` node. A missing entry point is
    /// reported as [`FlowError::MissingEntryPoint`]; everything else as
    /// [`FlowError::Validation`].
    pub fn validate(&self) -> Result<()> {
        for edge in &self.edges {
            if self.node(&edge.source).is_none() {
                return Err(FlowError::Validation(format!(
                    "edge '{}' references unknown source node '{}'",
                    edge.id, edge.source
                )));
            }
            if self.node(&edge.target).is_none() {
                return Err(FlowError::Validation(format!(
                    "edge '{}' references unknown target node '{}'",
                    edge.id, edge.target
                )));
            }
        }

        let input_count = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Input(_)))
            .count();
        match input_count {
            0 => Err(FlowError::MissingEntryPoint),
            1 => Ok(()),
            n => Err(FlowError::Validation(format!(
                "workflow has {} input nodes, expected exactly one",
                n
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_workflow() -> Workflow {
        serde_json::from_value(json!({
            "id": "wf-1",
            "name": "Sample",
            "nodes": [
                {"id": "1", "type": "input", "data": {"label": "In", "inputValue": "hello"}},
                {"id": "2", "type": "aiPrompt", "data": {"promptTemplate": "Say {{input}}", "temperature": 0.7, "maxTokens": 100}},
                {"id": "3", "type": "output", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "1", "target": "2"},
                {"id": "e2", "source": "2", "target": "3", "sourceHandle": "out"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_editor_shape() {
        let wf = sample_workflow();
        assert_eq!(wf.nodes.len(), 3);

        match &wf.node("2").unwrap().kind {
            NodeKind::AiPrompt(data) => {
                assert_eq!(data.prompt_template, "Say {{input}}");
                assert_eq!(data.max_tokens, Some(100));
            }
            other => panic!("expected aiPrompt, got {}", other.name()),
        }

        match &wf.node("1").unwrap().kind {
            NodeKind::Input(data) => assert_eq!(data.value, Some(json!("hello"))),
            other => panic!("expected input, got {}", other.name()),
        }
    }

    #[test]
    fn test_unknown_node_type_fails() {
        let result: std::result::Result<Workflow, _> = serde_json::from_value(json!({
            "id": "wf-bad",
            "name": "Bad",
            "nodes": [{"id": "1", "type": "database", "data": {}}],
            "edges": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_workflow().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_entry() {
        let wf: Workflow = serde_json::from_value(json!({
            "id": "wf-2",
            "name": "NoEntry",
            "nodes": [{"id": "1", "type": "output", "data": {}}],
            "edges": []
        }))
        .unwrap();
        assert!(matches!(wf.validate(), Err(FlowError::MissingEntryPoint)));
    }

    #[test]
    fn test_validate_duplicate_entry() {
        let wf: Workflow = serde_json::from_value(json!({
            "id": "wf-3",
            "name": "TwoEntries",
            "nodes": [
                {"id": "1", "type": "input", "data": {}},
                {"id": "2", "type": "input", "data": {}}
            ],
            "edges": []
        }))
        .unwrap();
        assert!(matches!(wf.validate(), Err(FlowError::Validation(_))));
        assert!(wf.entry_node().is_none());
    }

    #[test]
    fn test_validate_dangling_edge() {
        let wf: Workflow = serde_json::from_value(json!({
            "id": "wf-4",
            "name": "Dangling",
            "nodes": [{"id": "1", "type": "input", "data": {}}],
            "edges": [{"id": "e1", "source": "1", "target": "ghost"}]
        }))
        .unwrap();
        match wf.validate() {
            Err(FlowError::Validation(msg)) => assert!(msg.contains("ghost")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_outgoing_iterator_outlives_source_key() {
        let wf = sample_workflow();
        let edges = {
            let source = String::from("1");
            wf.outgoing(&source)
        };
        let targets: Vec<&str> = edges.map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["2"]);
    }

    #[test]
    fn test_outgoing_with_handle() {
        let wf = sample_workflow();
        let matched = wf.outgoing_with_handle("2", "out");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].target, "3");
        assert!(wf.outgoing_with_handle("2", "yes").is_empty());
    }

    #[test]
    fn test_transform_kind_unrecognized_falls_back() {
        let data: TransformData =
            serde_json::from_value(json!({"transformType": "split"})).unwrap();
        assert_eq!(data.transform_type, TransformKind::Passthrough);

        let data: TransformData = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data.transform_type, TransformKind::Format);
    }

    #[test]
    fn test_loop_count_default() {
        let data: LoopData = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data.count(), LoopData::DEFAULT_COUNT);

        let data: LoopData = serde_json::from_value(json!({"loopCount": 5})).unwrap();
        assert_eq!(data.count(), 5);
    }
}
