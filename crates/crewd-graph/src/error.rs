//! Graph error types.

use thiserror::Error;

use super::edge::EdgeId;
use super::node::NodeId;

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while building or inspecting a workflow graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id appeared more than once in a definition.
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    /// An edge references a node that does not exist.
    #[error("edge {edge_id} references unknown node {node_id}")]
    UnknownNode {
        /// The offending edge.
        edge_id: EdgeId,
        /// The missing node id.
        node_id: NodeId,
    },

    /// The definition could not be interpreted.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
