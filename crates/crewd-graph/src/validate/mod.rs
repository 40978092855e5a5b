//! Structural validation of workflow definitions.

mod cache;
mod rules;

use std::collections::{HashMap, HashSet};

use crewd_core::Timing;
use jiff::Timestamp;

pub use cache::{ContentHash, ResultCache, content_hash};

use crate::TRACING_TARGET;
use crate::config::ValidationConfig;
use crate::definition::WorkflowDefinition;
use crate::graph::WorkflowGraph;
use crate::issue::{
    CompatibilityReport, EdgeValidation, NodeValidation, StructureAnalysis, ValidationIssue,
    ValidationMetrics, ValidationResult, codes,
};
use crate::node::{NodeId, NodeKind};
use crate::error::GraphResult;
use crate::topology::TopologyAnalyzer;

/// Decides whether a workflow definition is runnable.
///
/// Validation is a pure function of the definition payload, which makes the
/// result cacheable: byte-identical payloads within the TTL window are served
/// from the cache instead of recomputing.
#[derive(Debug)]
pub struct StructuralValidator {
    config: ValidationConfig,
    cache: ResultCache,
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl StructuralValidator {
    /// Creates a validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        let cache = ResultCache::new(config.cache_ttl);
        Self { config, cache }
    }

    /// Returns the validator configuration.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a workflow definition and produces a full report.
    pub fn validate(&self, definition: &WorkflowDefinition) -> GraphResult<ValidationResult> {
        let payload = definition.canonical_payload()?;
        let hash = content_hash(&payload);

        if let Some(result) = self.cache.get(&hash) {
            tracing::debug!(
                target: TRACING_TARGET,
                graph_id = %definition.graph_id,
                "Validation result served from cache"
            );
            return Ok(result);
        }

        let started_at = Timestamp::now();
        let mut global_issues = Vec::new();

        self.check_size_limits(definition, &mut global_issues);

        let kinds_by_id = unique_node_kinds(definition, &mut global_issues);
        let edge_results = validate_edges(definition, &kinds_by_id);

        let graph = build_graph(definition, &kinds_by_id, &edge_results);
        let structure_analysis = self.analyze_structure(&graph, &mut global_issues);

        let node_results: Vec<NodeValidation> = definition
            .nodes
            .iter()
            .map(|node| {
                let issues = rules::node_issues(node, &kinds_by_id);
                NodeValidation {
                    node_id: node.id,
                    is_valid: !issues.iter().any(ValidationIssue::is_error),
                    issues,
                }
            })
            .collect();

        let compatibility = self.check_compatibility(definition);

        let mut result = ValidationResult {
            is_valid: false,
            node_results,
            edge_results,
            global_issues,
            structure_analysis,
            compatibility,
            metrics: ValidationMetrics {
                node_count: definition.nodes.len(),
                edge_count: definition.edges.len(),
                error_count: 0,
                warning_count: 0,
                timing: Timing::since(started_at),
            },
        };

        result.metrics.error_count = result.error_count();
        result.metrics.warning_count = result
            .all_issues()
            .filter(|i| i.severity == crate::issue::Severity::Warning)
            .count();
        result.is_valid = result.metrics.error_count == 0;

        tracing::debug!(
            target: TRACING_TARGET,
            graph_id = %definition.graph_id,
            is_valid = result.is_valid,
            error_count = result.metrics.error_count,
            warning_count = result.metrics.warning_count,
            "Workflow definition validated"
        );

        self.cache.insert(hash, result.clone());
        Ok(result)
    }

    fn check_size_limits(&self, definition: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
        if definition.nodes.len() > self.config.max_nodes {
            issues.push(ValidationIssue::error(
                codes::TOO_MANY_NODES,
                format!(
                    "graph has {} nodes, limit is {}",
                    definition.nodes.len(),
                    self.config.max_nodes
                ),
            ));
        }
        if definition.edges.len() > self.config.max_edges {
            issues.push(ValidationIssue::error(
                codes::TOO_MANY_EDGES,
                format!(
                    "graph has {} edges, limit is {}",
                    definition.edges.len(),
                    self.config.max_edges
                ),
            ));
        }
    }

    fn analyze_structure(
        &self,
        graph: &WorkflowGraph,
        issues: &mut Vec<ValidationIssue>,
    ) -> StructureAnalysis {
        let topology = TopologyAnalyzer::new(graph);

        let entry_points = topology.entry_points();
        let exit_points = topology.exit_points();
        let isolated_nodes = topology.isolated_nodes();
        let cycles = topology.circular_dependencies();
        let max_depth = topology.max_depth();
        let complexity_score = topology.complexity_score();
        let strongly_connected_components: Vec<Vec<NodeId>> = topology
            .strongly_connected_components()
            .into_iter()
            .filter(|component| component.len() > 1)
            .collect();

        if self.config.require_entry_point && entry_points.is_empty() {
            issues.push(
                ValidationIssue::error(codes::MISSING_ENTRY_POINT, "graph has no entry point")
                    .with_suggestion("add a node without incoming edges"),
            );
        }
        if self.config.require_exit_point && exit_points.is_empty() {
            issues.push(
                ValidationIssue::error(codes::MISSING_EXIT_POINT, "graph has no exit point")
                    .with_suggestion("add a node without outgoing edges"),
            );
        }

        for cycle in &cycles {
            let path = cycle
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            let issue = if self.config.allow_cycles {
                ValidationIssue::info(codes::CIRCULAR_DEPENDENCY, format!("cycle allowed: {path}"))
            } else {
                ValidationIssue::error(
                    codes::CIRCULAR_DEPENDENCY,
                    format!("circular dependency: {path}"),
                )
                .with_suggestion("break the cycle or allow circular dependencies")
            };
            issues.push(issue);
        }

        for &node_id in &isolated_nodes {
            issues.push(
                ValidationIssue::warning(codes::ISOLATED_NODE, format!("node {node_id} touches no edges"))
                    .with_node(node_id),
            );
        }

        if max_depth > self.config.max_depth {
            issues.push(ValidationIssue::warning(
                codes::EXCESSIVE_DEPTH,
                format!("graph depth {} exceeds {}", max_depth, self.config.max_depth),
            ));
        }

        StructureAnalysis {
            entry_points,
            exit_points,
            isolated_nodes,
            cycles,
            max_depth,
            complexity_score,
            strongly_connected_components,
        }
    }

    /// Single-crew execution compatibility pass.
    ///
    /// Exactly one crew node must exist. A hierarchical crew without any
    /// delegating agent is flagged as a warning, not an error.
    fn check_compatibility(&self, definition: &WorkflowDefinition) -> CompatibilityReport {
        let crews: Vec<_> = definition
            .nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Crew)
            .collect();
        let crew_count = crews.len();
        let mut issues = Vec::new();

        match crew_count {
            0 => issues.push(
                ValidationIssue::error(codes::NO_CREW_DETECTED, "graph contains no crew node")
                    .with_suggestion("add exactly one crew node"),
            ),
            1 => {
                let crew = crews[0];
                if crew.data_str("process") == Some("hierarchical")
                    && !has_delegating_agent(definition, crew)
                {
                    issues.push(
                        ValidationIssue::warning(
                            codes::NO_DELEGATING_AGENT,
                            "hierarchical crew has no delegating agent",
                        )
                        .with_node(crew.id)
                        .with_suggestion("enable allow_delegation on at least one member agent"),
                    );
                }
            }
            n => issues.push(ValidationIssue::error(
                codes::MULTIPLE_CREWS_DETECTED,
                format!("graph contains {n} crew nodes, expected exactly 1"),
            )),
        }

        CompatibilityReport {
            is_compatible: !issues.iter().any(ValidationIssue::is_error),
            crew_count,
            issues,
        }
    }
}

/// Collects the first occurrence of every node id; duplicate ids are
/// reported as global errors.
fn unique_node_kinds(
    definition: &WorkflowDefinition,
    issues: &mut Vec<ValidationIssue>,
) -> HashMap<NodeId, NodeKind> {
    let mut kinds = HashMap::new();
    for node in &definition.nodes {
        if kinds.insert(node.id, node.kind).is_some() {
            issues.push(
                ValidationIssue::error(
                    codes::DUPLICATE_NODE_ID,
                    format!("node id {} appears more than once", node.id),
                )
                .with_node(node.id),
            );
        }
    }
    kinds
}

/// Validates that every edge references existing nodes.
fn validate_edges(
    definition: &WorkflowDefinition,
    kinds_by_id: &HashMap<NodeId, NodeKind>,
) -> Vec<EdgeValidation> {
    definition
        .edges
        .iter()
        .map(|edge| {
            let mut issues = Vec::new();
            if !kinds_by_id.contains_key(&edge.source) {
                issues.push(
                    ValidationIssue::error(
                        codes::INVALID_EDGE_SOURCE,
                        format!("edge {} source {} does not exist", edge.id, edge.source),
                    )
                    .with_edge(edge.id),
                );
            }
            if !kinds_by_id.contains_key(&edge.target) {
                issues.push(
                    ValidationIssue::error(
                        codes::INVALID_EDGE_TARGET,
                        format!("edge {} target {} does not exist", edge.id, edge.target),
                    )
                    .with_edge(edge.id),
                );
            }
            EdgeValidation {
                edge_id: edge.id,
                is_valid: issues.is_empty(),
                issues,
            }
        })
        .collect()
}

/// Builds the runtime graph from the resolvable parts of the definition.
///
/// Duplicate nodes and dangling edges were already reported; topology runs on
/// what remains.
fn build_graph(
    definition: &WorkflowDefinition,
    kinds_by_id: &HashMap<NodeId, NodeKind>,
    edge_results: &[EdgeValidation],
) -> WorkflowGraph {
    let valid_edges: HashSet<_> = edge_results
        .iter()
        .filter(|e| e.is_valid)
        .map(|e| e.edge_id)
        .collect();

    let mut graph = WorkflowGraph::with_metadata(definition.metadata.clone());
    let mut seen = HashSet::new();
    for node in &definition.nodes {
        if kinds_by_id.contains_key(&node.id) && seen.insert(node.id) {
            // Ids are unique after dedup, so this cannot fail.
            let _ = graph.add_node(node.clone());
        }
    }
    for edge in &definition.edges {
        if valid_edges.contains(&edge.id) {
            let _ = graph.add_edge(edge.clone());
        }
    }
    graph
}

/// Returns whether any agent referenced by the crew allows delegation.
fn has_delegating_agent(definition: &WorkflowDefinition, crew: &crate::node::Node) -> bool {
    let member_ids: HashSet<NodeId> = crew
        .data
        .get("agent_ids")
        .and_then(|v| v.as_array())
        .map(|members| {
            members
                .iter()
                .filter_map(|m| m.as_str())
                .filter_map(|s| uuid::Uuid::parse_str(s).ok())
                .map(NodeId::from)
                .collect()
        })
        .unwrap_or_default();

    definition
        .nodes
        .iter()
        .filter(|node| node.kind == NodeKind::Agent && member_ids.contains(&node.id))
        .any(|agent| {
            agent
                .data
                .get("allow_delegation")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowMetadata;
    use crate::edge::Edge;
    use crate::node::Node;
    use uuid::Uuid;

    fn agent(name: &str) -> Node {
        Node::new(NodeKind::Agent, name).with_data(serde_json::json!({
            "role": "r", "goal": "g", "backstory": "b",
        }))
    }

    fn task(name: &str) -> Node {
        Node::new(NodeKind::Task, name).with_data(serde_json::json!({
            "description": "d", "expected_output": "o",
        }))
    }

    fn crew_for(agents: &[&Node], tasks: &[&Node], process: &str) -> Node {
        Node::new(NodeKind::Crew, "crew").with_data(serde_json::json!({
            "process": process,
            "agent_ids": agents.iter().map(|n| n.id.as_uuid().to_string()).collect::<Vec<_>>(),
            "task_ids": tasks.iter().map(|n| n.id.as_uuid().to_string()).collect::<Vec<_>>(),
        }))
    }

    /// A minimal runnable definition: agent -> task -> crew.
    fn runnable() -> WorkflowDefinition {
        let a = agent("a");
        let t = task("t");
        let c = crew_for(&[&a], &[&t], "sequential");

        let mut definition =
            WorkflowDefinition::new(Uuid::new_v4(), WorkflowMetadata::named("demo"));
        let a_id = definition.push_node(a);
        let t_id = definition.push_node(t);
        let c_id = definition.push_node(c);
        definition.push_edge(Edge::new(a_id, t_id));
        definition.push_edge(Edge::new(t_id, c_id));
        definition
    }

    #[test]
    fn test_runnable_definition_is_valid() {
        let validator = StructuralValidator::default();
        let result = validator.validate(&runnable()).unwrap();
        assert!(result.is_valid, "issues: {:?}", result.all_issues().collect::<Vec<_>>());
        assert!(result.compatibility.is_compatible);
        assert_eq!(result.compatibility.crew_count, 1);
    }

    #[test]
    fn test_multiple_crews_single_error_with_count() {
        let mut definition = runnable();
        let a = definition.nodes[0].clone();
        let t = definition.nodes[1].clone();
        definition.push_node(crew_for(&[&a], &[&t], "sequential"));

        let validator = StructuralValidator::default();
        let result = validator.validate(&definition).unwrap();

        let crew_errors: Vec<_> = result
            .compatibility
            .issues
            .iter()
            .filter(|i| i.code == codes::MULTIPLE_CREWS_DETECTED)
            .collect();
        assert_eq!(crew_errors.len(), 1);
        assert!(crew_errors[0].is_error());
        assert_eq!(result.compatibility.crew_count, 2);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_cycle_blocks_unless_allowed() {
        let mut definition = runnable();
        let first = definition.nodes[0].id;
        let last = definition.nodes[2].id;
        definition.push_edge(Edge::new(last, first));

        let strict = StructuralValidator::default();
        let result = strict.validate(&definition).unwrap();
        assert!(!result.is_valid);
        assert!(result.global_issues.iter().any(|i| i.code == codes::CIRCULAR_DEPENDENCY));

        let lenient = StructuralValidator::new(
            crate::config::ValidationConfigBuilder::default()
                .allow_cycles(true)
                // The cycle swallows the entry and exit points.
                .require_entry_point(false)
                .require_exit_point(false)
                .build()
                .unwrap(),
        );
        let result = lenient.validate(&definition).unwrap();
        assert!(result.is_valid, "issues: {:?}", result.all_issues().collect::<Vec<_>>());
    }

    #[test]
    fn test_dangling_edge_reported() {
        let mut definition = runnable();
        definition.push_edge(Edge::new(definition.nodes[0].id, NodeId::new()));

        let result = StructuralValidator::default().validate(&definition).unwrap();
        assert!(!result.is_valid);
        let invalid_edges: Vec<_> = result.edge_results.iter().filter(|e| !e.is_valid).collect();
        assert_eq!(invalid_edges.len(), 1);
        assert_eq!(invalid_edges[0].issues[0].code, codes::INVALID_EDGE_TARGET);
    }

    #[test]
    fn test_size_limit_enforced() {
        let validator = StructuralValidator::new(
            crate::config::ValidationConfigBuilder::default()
                .max_nodes(2usize)
                .build()
                .unwrap(),
        );
        let result = validator.validate(&runnable()).unwrap();
        assert!(result.global_issues.iter().any(|i| i.code == codes::TOO_MANY_NODES));
    }

    #[test]
    fn test_hierarchical_without_delegation_warns() {
        let a = agent("a");
        let t = task("t");
        let c = crew_for(&[&a], &[&t], "hierarchical");

        let mut definition =
            WorkflowDefinition::new(Uuid::new_v4(), WorkflowMetadata::named("demo"));
        let a_id = definition.push_node(a);
        let t_id = definition.push_node(t);
        let c_id = definition.push_node(c);
        definition.push_edge(Edge::new(a_id, t_id));
        definition.push_edge(Edge::new(t_id, c_id));

        let result = StructuralValidator::default().validate(&definition).unwrap();
        let warning = result
            .compatibility
            .issues
            .iter()
            .find(|i| i.code == codes::NO_DELEGATING_AGENT)
            .expect("delegation warning");
        assert_eq!(warning.severity, crate::issue::Severity::Warning);
        // Warnings do not block execution.
        assert!(result.is_valid);
    }

    #[test]
    fn test_cache_returns_identical_result() {
        let validator = StructuralValidator::default();
        let definition = runnable();

        let first = validator.validate(&definition).unwrap();
        let second = validator.validate(&definition).unwrap();
        // The cached copy carries the original timing.
        assert_eq!(first, second);
    }

    #[test]
    fn test_isolated_node_warns() {
        let mut definition = runnable();
        definition.push_node(Node::new(NodeKind::Tool, "lone").with_data(
            serde_json::json!({ "tool_type": "search" }),
        ));

        let result = StructuralValidator::default().validate(&definition).unwrap();
        assert!(result.global_issues.iter().any(|i| i.code == codes::ISOLATED_NODE));
        assert!(result.is_valid);
    }
}
