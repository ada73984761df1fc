use std::collections::HashSet;

use serde::Serialize;

use super::relationships::{NormalizedRelationship, RelationshipsByOwner};
use super::roles::{AssignedRole, RoleAssignment};
use super::ResourceInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeClass {
    ResourceInstanceNode,
    UserNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeClass {
    RelationshipConnection,
}

impl NodeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeClass::ResourceInstanceNode => "resource-instance-node",
            NodeClass::UserNode => "user-node",
        }
    }
}

impl EdgeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeClass::RelationshipConnection => "relationship-connection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<NodeClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<EdgeClass>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// How relationship edges are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgePasses {
    /// One `"IS {LABEL} OF"` edge from resolved subject to resolved object.
    #[default]
    Canonical,
    /// Two passes: owner to raw object labeled `"IS {LABEL} OF"`, then
    /// resolved subject to resolved object labeled `{LABEL}`. Usually draws
    /// each relationship twice.
    Compat,
}

/// Accumulates nodes and edges, deduplicating nodes by id.
#[derive(Default)]
struct Builder {
    graph: Graph,
    seen: HashSet<String>,
}

impl Builder {
    fn node(&mut self, id: &str, label: impl Into<String>, classes: Option<NodeClass>) {
        if self.seen.insert(id.to_string()) {
            self.graph.nodes.push(GraphNode {
                id: id.to_string(),
                label: label.into(),
                classes,
            });
        }
    }

    fn edge(&mut self, source: &str, target: &str, label: String, classes: Option<EdgeClass>) {
        self.graph.edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            label,
            classes,
        });
    }

    /// Adds a bare node for `target` if needed, then a relationship edge
    /// unless it would be a self loop.
    fn relationship(&mut self, source: &str, target: &str, label: String) {
        self.node(target, target, None);

        if source != target {
            self.edge(source, target, label, Some(EdgeClass::RelationshipConnection));
        }
    }
}

/// Merge resource instances, their relationships, and role assignments into
/// a single graph in which every edge endpoint is a node.
pub fn assemble(
    instances: &[ResourceInstance],
    relationships: &RelationshipsByOwner,
    assignments: &[RoleAssignment],
    passes: EdgePasses,
) -> Graph {
    let mut b = Builder::default();

    for instance in instances {
        b.node(
            &instance.id,
            format!(" {}", instance.label),
            Some(NodeClass::ResourceInstanceNode),
        );
    }

    let flat = || relationships.values().flatten();
    match passes {
        EdgePasses::Canonical => {
            for r in flat() {
                b.relationship(r.subject.as_str(), r.object.as_str(), is_of(r));
            }
        }
        EdgePasses::Compat => {
            for r in flat() {
                b.relationship(&r.owner, &r.raw_object, is_of(r));
            }
            for r in flat() {
                b.relationship(r.subject.as_str(), r.object.as_str(), r.label.to_string());
            }
        }
    }

    for assignment in assignments {
        b.node(&assignment.user, assignment.user.as_str(), Some(NodeClass::UserNode));

        let Some(instance) = assignment.resource_instance.node_id() else {
            continue;
        };
        b.node(&instance, instance.as_str(), Some(NodeClass::ResourceInstanceNode));

        if assignment.role != AssignedRole::Unassigned {
            b.edge(&assignment.user, &instance, assignment.role.to_string(), None);
        }
    }

    let Builder { mut graph, mut seen } = b;

    let mut placeholders = Vec::new();
    for edge in &graph.edges {
        for id in [&edge.source, &edge.target] {
            if seen.insert(id.clone()) {
                placeholders.push(GraphNode {
                    id: id.clone(),
                    label: format!("Node {id}"),
                    classes: Some(NodeClass::ResourceInstanceNode),
                });
            }
        }
    }
    if !placeholders.is_empty() {
        tracing::debug!(count = placeholders.len(), "added placeholder nodes for dangling edges");
    }
    graph.nodes.extend(placeholders);

    graph
}

fn is_of(r: &NormalizedRelationship) -> String {
    format!("IS {} OF", r.label)
}
