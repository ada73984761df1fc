use permit_client::models;

use super::resolver::{IdentityResolver, Reference};

/// The role of a flattened assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignedRole {
    Named(String),
    /// A resource-instance role record without a role name.
    Unknown,
    /// The user has no resource-instance role in the tenant, or no tenant.
    Unassigned,
}

impl std::fmt::Display for AssignedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignedRole::Named(name) => f.write_str(name),
            AssignedRole::Unknown => f.write_str("Unknown Role"),
            AssignedRole::Unassigned => f.write_str("No Role Assigned"),
        }
    }
}

/// The resource instance a role is assigned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignedInstance {
    Instance(Reference),
    /// A resource-instance role record without an instance.
    Unknown,
    Unassigned,
}

impl AssignedInstance {
    /// Id of the graph node of this instance, if it has one.
    pub fn node_id(&self) -> Option<String> {
        match self {
            AssignedInstance::Instance(reference) => Some(reference.to_string()),
            AssignedInstance::Unknown => Some(self.to_string()),
            AssignedInstance::Unassigned => None,
        }
    }
}

impl std::fmt::Display for AssignedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignedInstance::Instance(reference) => reference.fmt(f),
            AssignedInstance::Unknown => f.write_str("Unknown Resource Instance"),
            AssignedInstance::Unassigned => f.write_str("No Resource Instance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub user: String,
    pub email: String,
    pub role: AssignedRole,
    pub resource_instance: AssignedInstance,
}

/// Flatten the tenants and resource-instance roles of `users` into one
/// assignment per role. Users without tenants, and tenants without roles,
/// still contribute one unassigned record each.
pub fn flatten(users: &[models::User], resolver: &IdentityResolver) -> Vec<RoleAssignment> {
    let mut out = Vec::with_capacity(users.len());

    for user in users {
        let key = if user.key.is_empty() {
            "Unknown User"
        } else {
            user.key.as_str()
        };
        let unassigned = || RoleAssignment {
            user: key.to_string(),
            email: user.email.clone(),
            role: AssignedRole::Unassigned,
            resource_instance: AssignedInstance::Unassigned,
        };

        if user.associated_tenants.is_empty() {
            out.push(unassigned());
            continue;
        }

        for tenant in &user.associated_tenants {
            if tenant.resource_instance_roles.is_empty() {
                out.push(unassigned());
                continue;
            }
            for record in &tenant.resource_instance_roles {
                out.push(RoleAssignment {
                    user: key.to_string(),
                    email: user.email.clone(),
                    role: assigned_role(&record.role),
                    resource_instance: assigned_instance(record, resolver),
                });
            }
        }
    }
    out
}

fn assigned_role(role: &str) -> AssignedRole {
    if role.is_empty() {
        AssignedRole::Unknown
    } else {
        AssignedRole::Named(role.to_string())
    }
}

fn assigned_instance(
    record: &models::ResourceInstanceRole,
    resolver: &IdentityResolver,
) -> AssignedInstance {
    match resolver.resolve_instance(&record.resource, &record.resource_instance) {
        Reference::Raw(raw) if raw.is_empty() => AssignedInstance::Unknown,
        reference => AssignedInstance::Instance(reference),
    }
}
