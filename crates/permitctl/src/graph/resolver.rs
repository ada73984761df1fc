use std::collections::HashMap;

use super::ResourceInstance;

/// The outcome of looking up a reference: either the id of a fetched
/// resource instance, or the reference itself when nothing matched.
/// Both serialize as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(untagged)]
pub enum Reference {
    Resolved(String),
    Raw(String),
}

impl Reference {
    pub fn as_str(&self) -> &str {
        match self {
            Reference::Resolved(s) | Reference::Raw(s) => s,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the `"{resource}:{key}"` composite (id2) of each resource instance to
/// its id. Built once and read-only afterwards.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    by_id2: HashMap<String, String>,
}

impl IdentityResolver {
    /// Index `instances`. When two instances share an id2, the later one wins.
    pub fn new<'a>(instances: impl IntoIterator<Item = &'a ResourceInstance>) -> Self {
        let mut by_id2 = HashMap::new();

        for instance in instances {
            if let Some(previous) = by_id2.insert(instance.id2.clone(), instance.id.clone()) {
                if previous != instance.id {
                    tracing::warn!(
                        id2 = %instance.id2,
                        %previous,
                        id = %instance.id,
                        "resource instances share a type and key; using the last one"
                    );
                }
            }
        }
        Self { by_id2 }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.by_id2.len()
    }

    /// Resolve an id2-like reference, falling back to the reference verbatim.
    pub fn resolve(&self, reference: &str) -> Reference {
        match self.by_id2.get(reference) {
            Some(id) => Reference::Resolved(id.clone()),
            None => Reference::Raw(reference.to_string()),
        }
    }

    /// Resolve the instance `instance` of resource type `resource`, falling
    /// back to the bare instance key.
    pub fn resolve_instance(&self, resource: &str, instance: &str) -> Reference {
        match self.by_id2.get(&format!("{resource}:{instance}")) {
            Some(id) => Reference::Resolved(id.clone()),
            None => Reference::Raw(instance.to_string()),
        }
    }
}
