//! Workflow edge types.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use uuid::Uuid;

use super::node::NodeId;

/// Unique identifier of a workflow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Display, From, Into)]
pub struct EdgeId(Uuid);

impl EdgeId {
    /// Creates a new random edge identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of a workflow edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, StrumDisplay, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Execution-order dependency.
    #[default]
    Flow,
    /// Data handoff between nodes.
    Data,
}

/// A directed edge between two workflow nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Edge kind.
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    /// Creates a new flow edge between two nodes.
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            kind: EdgeKind::Flow,
        }
    }

    /// Sets the edge kind.
    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_defaults_to_flow() {
        let edge = Edge::new(NodeId::new(), NodeId::new());
        assert_eq!(edge.kind, EdgeKind::Flow);
    }

    #[test]
    fn test_edge_kind_serde() {
        let json = serde_json::to_string(&EdgeKind::Data).unwrap();
        assert_eq!(json, "\"data\"");
    }
}
