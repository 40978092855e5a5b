//! Workflow graph runtime representation.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::definition::{WorkflowDefinition, WorkflowMetadata};
use super::edge::Edge;
use super::error::{GraphError, GraphResult};
use super::node::{Node, NodeId};

/// A workflow graph containing nodes and edges.
///
/// Internally uses petgraph's `DiGraph` for efficient graph operations.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    graph: DiGraph<Node, Edge>,
    /// Mapping from NodeId to petgraph's NodeIndex.
    node_indices: HashMap<NodeId, NodeIndex>,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new workflow graph with metadata.
    pub fn with_metadata(metadata: WorkflowMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node to the graph.
    ///
    /// Returns an error if a node with the same id already exists.
    pub fn add_node(&mut self, node: Node) -> GraphResult<NodeId> {
        let id = node.id;
        if self.node_indices.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        Ok(id)
    }

    /// Returns a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let index = self.node_indices.get(&id)?;
        self.graph.node_weight(*index)
    }

    /// Returns whether a node exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    /// Returns an iterator over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns an iterator over all node IDs in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|node| node.id)
    }

    /// Adds an edge between two existing nodes.
    pub fn add_edge(&mut self, edge: Edge) -> GraphResult<()> {
        let source = *self
            .node_indices
            .get(&edge.source)
            .ok_or(GraphError::UnknownNode {
                edge_id: edge.id,
                node_id: edge.source,
            })?;
        let target = *self
            .node_indices
            .get(&edge.target)
            .ok_or(GraphError::UnknownNode {
                edge_id: edge.id,
                node_id: edge.target,
            })?;

        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    /// Returns an iterator over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    /// Returns the targets of a node's outgoing edges.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.directed_neighbors(id, Direction::Outgoing)
    }

    /// Returns the sources of a node's incoming edges.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.directed_neighbors(id, Direction::Incoming)
    }

    fn directed_neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        let Some(index) = self.node_indices.get(&id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(*index, direction)
            .filter_map(|edge_ref| {
                let other = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                self.graph.node_weight(other).map(|node| node.id)
            })
            .collect()
    }

    /// Returns the number of incoming edges of a node.
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.node_indices
            .get(&id)
            .map(|index| {
                self.graph
                    .edges_directed(*index, Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Returns the number of outgoing edges of a node.
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.node_indices
            .get(&id)
            .map(|index| {
                self.graph
                    .edges_directed(*index, Direction::Outgoing)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Returns a reference to the underlying petgraph.
    pub fn inner(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }

    /// Converts the graph back into a serializable definition.
    pub fn to_definition(&self, graph_id: uuid::Uuid) -> WorkflowDefinition {
        WorkflowDefinition {
            graph_id,
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().cloned().collect(),
            metadata: self.metadata.clone(),
        }
    }

    /// Builds a workflow graph from a definition.
    ///
    /// Returns an error on duplicate node ids or edges referencing missing
    /// nodes; the structural validator performs the same checks leniently
    /// when a report is wanted instead of a hard failure.
    pub fn from_definition(definition: &WorkflowDefinition) -> GraphResult<Self> {
        let mut graph = Self::with_metadata(definition.metadata.clone());

        for node in &definition.nodes {
            graph.add_node(node.clone())?;
        }
        for edge in &definition.edges {
            graph.add_edge(edge.clone())?;
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn two_nodes() -> (WorkflowGraph, NodeId, NodeId) {
        let mut graph = WorkflowGraph::new();
        let a = graph.add_node(Node::new(NodeKind::Agent, "a")).unwrap();
        let b = graph.add_node(Node::new(NodeKind::Task, "b")).unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_add_edge_connects_nodes() {
        let (mut graph, a, b) = two_nodes();
        graph.add_edge(Edge::new(a, b)).unwrap();

        assert_eq!(graph.successors(a), vec![b]);
        assert_eq!(graph.predecessors(b), vec![a]);
        assert_eq!(graph.in_degree(b), 1);
        assert_eq!(graph.out_degree(b), 0);
    }

    #[test]
    fn test_add_edge_unknown_node() {
        let (mut graph, a, _) = two_nodes();
        let missing = NodeId::new();
        let result = graph.add_edge(Edge::new(a, missing));
        assert!(matches!(result, Err(GraphError::UnknownNode { .. })));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = WorkflowGraph::new();
        let node = Node::new(NodeKind::Tool, "t");
        graph.add_node(node.clone()).unwrap();
        assert!(matches!(
            graph.add_node(node),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_definition_round_trip() {
        let (mut graph, a, b) = two_nodes();
        graph.add_edge(Edge::new(a, b)).unwrap();

        let graph_id = uuid::Uuid::new_v4();
        let definition = graph.to_definition(graph_id);
        let rebuilt = WorkflowGraph::from_definition(&definition).unwrap();

        assert_eq!(rebuilt.node_count(), 2);
        assert_eq!(rebuilt.edge_count(), 1);
        assert_eq!(rebuilt.successors(a), vec![b]);
    }
}
