//! Workflow node types.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};
use uuid::Uuid;

/// Unique identifier of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Display, From, Into)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Creates a new random node identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of a workflow node.
///
/// The kind selects which required-field schema applies during structural
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, StrumDisplay, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An agent with a role, goal, and backstory.
    Agent,
    /// A task with a description and expected output.
    Task,
    /// A tool binding.
    Tool,
    /// A flow control node.
    Flow,
    /// A crew grouping agents and tasks under a process.
    Crew,
    /// A language model configuration.
    Llm,
}

/// A single node of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Kind-specific configuration payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Node {
    /// Creates a new node with a random identifier.
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            name: name.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Sets the configuration payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Returns a string field from the configuration payload, if present.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_serde() {
        let json = serde_json::to_string(&NodeKind::Crew).unwrap();
        assert_eq!(json, "\"crew\"");
        assert_eq!(NodeKind::Llm.to_string(), "llm");
    }

    #[test]
    fn test_node_data_str() {
        let node = Node::new(NodeKind::Agent, "researcher")
            .with_data(serde_json::json!({ "role": "research" }));
        assert_eq!(node.data_str("role"), Some("research"));
        assert_eq!(node.data_str("goal"), None);
    }

    #[test]
    fn test_node_id_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
    }
}
