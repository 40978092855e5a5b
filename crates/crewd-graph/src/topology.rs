//! Pure graph-topology algorithms over a workflow graph.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;

use super::graph::WorkflowGraph;
use super::node::NodeId;

/// Analyzes the topology of a workflow graph.
///
/// Built once per graph; forward and reverse adjacency maps are derived from
/// the edge list, so nodes touching no edge appear in neither map.
#[derive(Debug)]
pub struct TopologyAnalyzer<'a> {
    graph: &'a WorkflowGraph,
    /// Node ids in insertion order, for deterministic traversal.
    order: Vec<NodeId>,
    /// source -> targets.
    forward: HashMap<NodeId, Vec<NodeId>>,
    /// target -> sources.
    reverse: HashMap<NodeId, Vec<NodeId>>,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Builds an analyzer from a workflow graph.
    pub fn new(graph: &'a WorkflowGraph) -> Self {
        let order: Vec<NodeId> = graph.node_ids().collect();
        let mut forward: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut reverse: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for edge in graph.edges() {
            forward.entry(edge.source).or_default().push(edge.target);
            reverse.entry(edge.target).or_default().push(edge.source);
        }

        Self {
            graph,
            order,
            forward,
            reverse,
        }
    }

    /// Returns nodes with outgoing edges but no incoming edges.
    pub fn entry_points(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.forward.contains_key(id) && !self.reverse.contains_key(id))
            .collect()
    }

    /// Returns nodes with incoming edges but no outgoing edges.
    pub fn exit_points(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.reverse.contains_key(id) && !self.forward.contains_key(id))
            .collect()
    }

    /// Returns nodes touching no edge at all.
    pub fn isolated_nodes(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| !self.forward.contains_key(id) && !self.reverse.contains_key(id))
            .collect()
    }

    /// Enumerates circular dependencies.
    ///
    /// Depth-first search with an explicit recursion stack; whenever a node
    /// already on the stack is revisited, the reported cycle is the stack
    /// slice from that node's first occurrence through the current node,
    /// closed with the revisited node. All discovered cycles are returned;
    /// overlapping cycles found from different roots are not deduplicated.
    pub fn circular_dependencies(&self) -> Vec<Vec<NodeId>> {
        let mut cycles = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();

        for &id in &self.order {
            if !visited.contains(&id) {
                self.cycle_dfs(id, &mut visited, &mut stack, &mut on_stack, &mut cycles);
            }
        }

        cycles
    }

    fn cycle_dfs(
        &self,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        stack: &mut Vec<NodeId>,
        on_stack: &mut HashSet<NodeId>,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        visited.insert(node);
        stack.push(node);
        on_stack.insert(node);

        if let Some(targets) = self.forward.get(&node) {
            for &next in targets {
                if !visited.contains(&next) {
                    self.cycle_dfs(next, visited, stack, on_stack, cycles);
                } else if on_stack.contains(&next) {
                    // First occurrence is guaranteed present on the stack.
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(next);
                    cycles.push(cycle);
                }
            }
        }

        stack.pop();
        on_stack.remove(&node);
    }

    /// Returns the maximum BFS layer index reached from any entry point.
    ///
    /// 0 if the graph has no entry points.
    pub fn max_depth(&self) -> usize {
        let mut max_depth = 0;

        for entry in self.entry_points() {
            let mut visited = HashSet::new();
            let mut queue = VecDeque::new();
            visited.insert(entry);
            queue.push_back((entry, 0usize));

            while let Some((node, depth)) = queue.pop_front() {
                max_depth = max_depth.max(depth);
                if let Some(targets) = self.forward.get(&node) {
                    for &next in targets {
                        if visited.insert(next) {
                            queue.push_back((next, depth + 1));
                        }
                    }
                }
            }
        }

        max_depth
    }

    /// Scores the structural complexity of the graph on a 0..=100 scale.
    ///
    /// Weighted blend of edge density, cycle pressure, and depth relative to
    /// graph size; 0 for an empty graph.
    pub fn complexity_score(&self) -> f64 {
        let node_count = self.graph.node_count();
        if node_count == 0 {
            return 0.0;
        }

        let edge_count = self.graph.edge_count() as f64;
        let n = node_count as f64;

        let edge_density = if node_count < 2 {
            0.0
        } else {
            edge_count / (n * (n - 1.0))
        };
        let cycle_ratio = self.circular_dependencies().len() as f64 / n;
        let depth_ratio = self.max_depth() as f64 / n;

        let score = 100.0 * (0.30 * edge_density + 0.40 * cycle_ratio + 0.30 * depth_ratio);
        score.min(100.0)
    }

    /// Returns the strongly connected components of the graph.
    ///
    /// Tarjan's algorithm via petgraph; used for diagnostics, not gating.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeId>> {
        tarjan_scc(self.graph.inner())
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .filter_map(|index| self.graph.inner().node_weight(index).map(|n| n.id))
                    .collect()
            })
            .collect()
    }

    /// Returns whether `target` is reachable from `source`.
    ///
    /// A node is always reachable from itself.
    pub fn is_reachable(&self, source: NodeId, target: NodeId) -> bool {
        if source == target {
            return true;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(source);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            if let Some(targets) = self.forward.get(&node) {
                for &next in targets {
                    if next == target {
                        return true;
                    }
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, NodeKind};

    fn chain(n: usize) -> (WorkflowGraph, Vec<NodeId>) {
        let mut graph = WorkflowGraph::new();
        let ids: Vec<NodeId> = (0..n)
            .map(|i| {
                graph
                    .add_node(Node::new(NodeKind::Task, format!("n{i}")))
                    .unwrap()
            })
            .collect();
        for pair in ids.windows(2) {
            graph.add_edge(Edge::new(pair[0], pair[1])).unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn test_entry_and_exit_points() {
        let (graph, ids) = chain(3);
        let topo = TopologyAnalyzer::new(&graph);
        assert_eq!(topo.entry_points(), vec![ids[0]]);
        assert_eq!(topo.exit_points(), vec![ids[2]]);
        assert!(topo.isolated_nodes().is_empty());
    }

    #[test]
    fn test_isolated_node_detected() {
        let (mut graph, _) = chain(2);
        let lone = graph.add_node(Node::new(NodeKind::Tool, "lone")).unwrap();
        let topo = TopologyAnalyzer::new(&graph);
        assert_eq!(topo.isolated_nodes(), vec![lone]);
    }

    #[test]
    fn test_three_node_cycle_contents() {
        let (mut graph, ids) = chain(3);
        graph.add_edge(Edge::new(ids[2], ids[0])).unwrap();

        let topo = TopologyAnalyzer::new(&graph);
        let cycles = topo.circular_dependencies();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec![ids[0], ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let (graph, _) = chain(5);
        let topo = TopologyAnalyzer::new(&graph);
        assert!(topo.circular_dependencies().is_empty());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let (mut graph, ids) = chain(2);
        graph.add_edge(Edge::new(ids[1], ids[1])).unwrap();
        let topo = TopologyAnalyzer::new(&graph);
        let cycles = topo.circular_dependencies();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec![ids[1], ids[1]]);
    }

    #[test]
    fn test_max_depth_of_chain() {
        let (graph, _) = chain(4);
        let topo = TopologyAnalyzer::new(&graph);
        assert_eq!(topo.max_depth(), 3);
    }

    #[test]
    fn test_max_depth_without_entry_points() {
        // A pure cycle has no entry points at all.
        let (mut graph, ids) = chain(3);
        graph.add_edge(Edge::new(ids[2], ids[0])).unwrap();
        let topo = TopologyAnalyzer::new(&graph);
        assert_eq!(topo.max_depth(), 0);
    }

    #[test]
    fn test_complexity_bounds() {
        let empty = WorkflowGraph::new();
        assert_eq!(TopologyAnalyzer::new(&empty).complexity_score(), 0.0);

        let mut single = WorkflowGraph::new();
        single.add_node(Node::new(NodeKind::Crew, "only")).unwrap();
        assert_eq!(TopologyAnalyzer::new(&single).complexity_score(), 0.0);

        let (mut dense, ids) = chain(3);
        dense.add_edge(Edge::new(ids[2], ids[0])).unwrap();
        dense.add_edge(Edge::new(ids[0], ids[2])).unwrap();
        let score = TopologyAnalyzer::new(&dense).complexity_score();
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_scc_finds_cycle_component() {
        let (mut graph, ids) = chain(4);
        graph.add_edge(Edge::new(ids[2], ids[1])).unwrap();

        let topo = TopologyAnalyzer::new(&graph);
        let components = topo.strongly_connected_components();
        let non_trivial: Vec<_> = components.iter().filter(|c| c.len() > 1).collect();
        assert_eq!(non_trivial.len(), 1);
        let mut members = non_trivial[0].clone();
        members.sort();
        let mut expected = vec![ids[1], ids[2]];
        expected.sort();
        assert_eq!(members, expected);
    }

    #[test]
    fn test_reachability() {
        let (graph, ids) = chain(3);
        let topo = TopologyAnalyzer::new(&graph);
        assert!(topo.is_reachable(ids[0], ids[2]));
        assert!(!topo.is_reachable(ids[2], ids[0]));
        assert!(topo.is_reachable(ids[1], ids[1]));
    }
}
