#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod definition;
mod edge;
mod error;
mod graph;
mod issue;
mod node;
mod topology;
pub mod validate;

pub use config::{ValidationConfig, ValidationConfigBuilder};
pub use definition::{WorkflowDefinition, WorkflowMetadata};
pub use edge::{Edge, EdgeId, EdgeKind};
pub use error::{GraphError, GraphResult};
pub use graph::WorkflowGraph;
pub use issue::{
    CompatibilityReport, EdgeValidation, NodeValidation, Severity, StructureAnalysis,
    ValidationIssue, ValidationMetrics, ValidationResult, codes,
};
pub use node::{Node, NodeId, NodeKind};
pub use topology::TopologyAnalyzer;
pub use validate::StructuralValidator;

/// Tracing target for graph operations.
pub const TRACING_TARGET: &str = "crewd_graph";
