//! Serializable workflow definition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::edge::Edge;
use super::node::Node;

/// Metadata attached to a workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Workflow name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowMetadata {
    /// Creates metadata with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A declarative workflow definition as submitted by callers.
///
/// This is the wire form of a workflow: an ordered list of nodes and edges
/// plus metadata. Node ordering is preserved so the content hash of a
/// definition is stable across round trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Identifier of the workflow this definition belongs to.
    pub graph_id: Uuid,
    /// Ordered node list.
    pub nodes: Vec<Node>,
    /// Ordered edge list.
    pub edges: Vec<Edge>,
    /// Workflow metadata.
    #[serde(default)]
    pub metadata: WorkflowMetadata,
}

impl WorkflowDefinition {
    /// Creates an empty definition for a workflow.
    pub fn new(graph_id: Uuid, metadata: WorkflowMetadata) -> Self {
        Self {
            graph_id,
            nodes: Vec::new(),
            edges: Vec::new(),
            metadata,
        }
    }

    /// Appends a node and returns its identifier.
    pub fn push_node(&mut self, node: Node) -> super::node::NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Appends an edge.
    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Serializes the definition into its canonical byte payload.
    ///
    /// Used as the input of the validation result cache key; two definitions
    /// with identical payloads validate identically.
    pub fn canonical_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
