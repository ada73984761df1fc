use indexmap::IndexMap;

use super::resolver::{IdentityResolver, Reference};
use super::ResourceInstance;

/// The name of a relation, upper-cased for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationLabel {
    Named(String),
    /// The relationship had no relation name.
    Unknown,
}

impl RelationLabel {
    pub fn new(relation: &str) -> Self {
        if relation.is_empty() {
            RelationLabel::Unknown
        } else {
            RelationLabel::Named(relation.to_uppercase())
        }
    }
}

impl std::fmt::Display for RelationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationLabel::Named(name) => f.write_str(name),
            RelationLabel::Unknown => f.write_str("UNKNOWN RELATION"),
        }
    }
}

/// A relationship tuple with its subject and object resolved to instance ids
/// where possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRelationship {
    pub label: RelationLabel,
    pub subject: Reference,
    pub object: Reference,
    /// The object reference as sent by the API.
    pub raw_object: String,
    /// Id of the resource instance which carried this relationship.
    pub owner: String,
}

/// Normalized relationships, grouped by the id of their owning instance in
/// the order instances were fetched.
pub type RelationshipsByOwner = IndexMap<String, Vec<NormalizedRelationship>>;

/// Normalize the relationships of every instance. Unresolvable references are
/// kept verbatim. If two instances share an id, the later instance's
/// relationships replace the earlier ones, keeping the earlier position.
pub fn normalize(instances: &[ResourceInstance], resolver: &IdentityResolver) -> RelationshipsByOwner {
    let mut by_owner = RelationshipsByOwner::with_capacity(instances.len());

    for instance in instances {
        let relations = instance
            .relationships
            .iter()
            .map(|relation| NormalizedRelationship {
                label: RelationLabel::new(&relation.relation),
                subject: resolver.resolve(&relation.subject),
                object: resolver.resolve(&relation.object),
                raw_object: relation.object.clone(),
                owner: instance.id.clone(),
            })
            .collect();

        by_owner.insert(instance.id.clone(), relations);
    }

    let unresolved = by_owner
        .values()
        .flatten()
        .filter(|r| !r.subject.is_resolved() || !r.object.is_resolved())
        .count();
    if unresolved != 0 {
        tracing::debug!(unresolved, "some relationships reference unknown resource instances");
    }
    by_owner
}
