//! Validation issue and report types.

use crewd_core::Timing;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};

use super::edge::EdgeId;
use super::node::NodeId;

/// Stable issue codes emitted by the structural validator.
pub mod codes {
    /// Node count exceeds the configured maximum.
    pub const TOO_MANY_NODES: &str = "TOO_MANY_NODES";
    /// Edge count exceeds the configured maximum.
    pub const TOO_MANY_EDGES: &str = "TOO_MANY_EDGES";
    /// A node id appears more than once.
    pub const DUPLICATE_NODE_ID: &str = "DUPLICATE_NODE_ID";
    /// The graph has no entry point.
    pub const MISSING_ENTRY_POINT: &str = "MISSING_ENTRY_POINT";
    /// The graph has no exit point.
    pub const MISSING_EXIT_POINT: &str = "MISSING_EXIT_POINT";
    /// The graph contains a circular dependency.
    pub const CIRCULAR_DEPENDENCY: &str = "CIRCULAR_DEPENDENCY";
    /// A node touches no edges.
    pub const ISOLATED_NODE: &str = "ISOLATED_NODE";
    /// The graph is deeper than the configured maximum.
    pub const EXCESSIVE_DEPTH: &str = "EXCESSIVE_DEPTH";
    /// A required field is missing or empty on a node.
    pub const MISSING_REQUIRED_FIELD: &str = "MISSING_REQUIRED_FIELD";
    /// A crew references a node id that does not exist.
    pub const UNKNOWN_MEMBER_REFERENCE: &str = "UNKNOWN_MEMBER_REFERENCE";
    /// A crew references a node of the wrong kind.
    pub const WRONG_MEMBER_KIND: &str = "WRONG_MEMBER_KIND";
    /// An edge source references a missing node.
    pub const INVALID_EDGE_SOURCE: &str = "INVALID_EDGE_SOURCE";
    /// An edge target references a missing node.
    pub const INVALID_EDGE_TARGET: &str = "INVALID_EDGE_TARGET";
    /// No crew node exists in a single-crew context.
    pub const NO_CREW_DETECTED: &str = "NO_CREW_DETECTED";
    /// More than one crew node exists in a single-crew context.
    pub const MULTIPLE_CREWS_DETECTED: &str = "MULTIPLE_CREWS_DETECTED";
    /// A hierarchical crew has no delegating agent.
    pub const NO_DELEGATING_AGENT: &str = "NO_DELEGATING_AGENT";
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Suspicious but runnable.
    Warning,
    /// Blocks execution.
    Error,
}

/// A single finding produced by the structural validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue severity.
    pub severity: Severity,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Node this issue applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Edge this issue applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<EdgeId>,
    /// Suggested remediation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Creates an error-severity issue.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning-severity issue.
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates an info-severity issue.
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_owned(),
            message: message.into(),
            node_id: None,
            edge_id: None,
            suggestion: None,
        }
    }

    /// Attaches the node this issue applies to.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Attaches the edge this issue applies to.
    pub fn with_edge(mut self, edge_id: EdgeId) -> Self {
        self.edge_id = Some(edge_id);
        self
    }

    /// Attaches a remediation suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Returns whether this issue blocks execution.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Validation outcome for a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeValidation {
    /// The validated node.
    pub node_id: NodeId,
    /// Whether the node has zero error-severity issues.
    pub is_valid: bool,
    /// Issues found on this node.
    pub issues: Vec<ValidationIssue>,
}

/// Validation outcome for a single edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeValidation {
    /// The validated edge.
    pub edge_id: EdgeId,
    /// Whether the edge has zero error-severity issues.
    pub is_valid: bool,
    /// Issues found on this edge.
    pub issues: Vec<ValidationIssue>,
}

/// Topology findings attached to a validation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    /// Entry points of the graph.
    pub entry_points: Vec<NodeId>,
    /// Exit points of the graph.
    pub exit_points: Vec<NodeId>,
    /// Nodes touching no edges.
    pub isolated_nodes: Vec<NodeId>,
    /// Discovered circular dependencies (duplicates preserved).
    pub cycles: Vec<Vec<NodeId>>,
    /// Maximum BFS layer index from any entry point.
    pub max_depth: usize,
    /// Complexity score in 0..=100.
    pub complexity_score: f64,
    /// Strongly connected components with more than one member.
    pub strongly_connected_components: Vec<Vec<NodeId>>,
}

/// Single-crew execution compatibility findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    /// Whether the graph is compatible with single-crew execution.
    pub is_compatible: bool,
    /// Number of crew nodes found.
    pub crew_count: usize,
    /// Compatibility issues.
    pub issues: Vec<ValidationIssue>,
}

/// Aggregate counters for a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Number of nodes validated.
    pub node_count: usize,
    /// Number of edges validated.
    pub edge_count: usize,
    /// Total error-severity issues.
    pub error_count: usize,
    /// Total warning-severity issues.
    pub warning_count: usize,
    /// Timing of the validation run.
    pub timing: Timing,
}

/// Full report returned by the structural validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the graph is runnable (zero error-severity issues anywhere).
    pub is_valid: bool,
    /// Per-node outcomes.
    pub node_results: Vec<NodeValidation>,
    /// Per-edge outcomes.
    pub edge_results: Vec<EdgeValidation>,
    /// Graph-level issues.
    pub global_issues: Vec<ValidationIssue>,
    /// Topology findings.
    pub structure_analysis: StructureAnalysis,
    /// Single-crew compatibility findings.
    pub compatibility: CompatibilityReport,
    /// Aggregate counters.
    pub metrics: ValidationMetrics,
}

impl ValidationResult {
    /// Iterates over every issue in the report.
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.global_issues
            .iter()
            .chain(self.node_results.iter().flat_map(|n| n.issues.iter()))
            .chain(self.edge_results.iter().flat_map(|e| e.issues.iter()))
            .chain(self.compatibility.issues.iter())
    }

    /// Counts error-severity issues across the whole report.
    pub fn error_count(&self) -> usize {
        self.all_issues().filter(|issue| issue.is_error()).count()
    }
}
