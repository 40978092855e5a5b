//! Per-node-kind required-field schema rules.

use std::collections::HashMap;

use uuid::Uuid;

use crate::issue::{ValidationIssue, codes};
use crate::node::{Node, NodeId, NodeKind};

/// Required non-empty string fields per node kind.
fn required_fields(kind: NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::Agent => &["role", "goal", "backstory"],
        NodeKind::Task => &["description", "expected_output"],
        NodeKind::Tool => &["tool_type"],
        NodeKind::Flow => &["flow_type"],
        NodeKind::Crew => &["process"],
        NodeKind::Llm => &[],
    }
}

/// Validates a single node against its kind's schema.
///
/// `kinds_by_id` maps every node id in the definition to its kind, for
/// resolving crew member references.
pub(super) fn node_issues(
    node: &Node,
    kinds_by_id: &HashMap<NodeId, NodeKind>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for field in required_fields(node.kind) {
        if node.data_str(field).is_none_or(str::is_empty) {
            issues.push(
                ValidationIssue::error(
                    codes::MISSING_REQUIRED_FIELD,
                    format!("{} node '{}' is missing field '{}'", node.kind, node.name, field),
                )
                .with_node(node.id)
                .with_suggestion(format!("set a non-empty '{field}' on this node")),
            );
        }
    }

    if node.kind == NodeKind::Crew {
        issues.extend(member_issues(node, "agent_ids", NodeKind::Agent, kinds_by_id));
        issues.extend(member_issues(node, "task_ids", NodeKind::Task, kinds_by_id));
    }

    issues
}

/// Checks one crew membership list: present, non-empty, and every id
/// resolvable to a node of the expected kind.
fn member_issues(
    crew: &Node,
    field: &str,
    expected: NodeKind,
    kinds_by_id: &HashMap<NodeId, NodeKind>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let members = crew.data.get(field).and_then(|v| v.as_array());
    let Some(members) = members.filter(|m| !m.is_empty()) else {
        issues.push(
            ValidationIssue::error(
                codes::MISSING_REQUIRED_FIELD,
                format!("crew node '{}' is missing field '{}'", crew.name, field),
            )
            .with_node(crew.id)
            .with_suggestion(format!("list at least one {expected} node id in '{field}'")),
        );
        return issues;
    };

    for member in members {
        let id = member
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(NodeId::from);

        let Some(id) = id else {
            issues.push(
                ValidationIssue::error(
                    codes::UNKNOWN_MEMBER_REFERENCE,
                    format!("crew node '{}' has an unparsable id in '{}'", crew.name, field),
                )
                .with_node(crew.id),
            );
            continue;
        };

        match kinds_by_id.get(&id) {
            None => issues.push(
                ValidationIssue::error(
                    codes::UNKNOWN_MEMBER_REFERENCE,
                    format!("crew node '{}' references missing node {} in '{}'", crew.name, id, field),
                )
                .with_node(crew.id),
            ),
            Some(kind) if *kind != expected => issues.push(
                ValidationIssue::error(
                    codes::WRONG_MEMBER_KIND,
                    format!(
                        "crew node '{}' references {} node {} in '{}', expected {}",
                        crew.name, kind, id, field, expected
                    ),
                )
                .with_node(crew.id),
            ),
            Some(_) => {}
        }
    }

    issues
}
