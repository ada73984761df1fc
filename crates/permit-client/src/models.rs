//! Wire types of the Permit.io REST API. Only the fields read by permitctl
//! are modeled; unknown fields are ignored.
use serde::{Deserialize, Serialize};

/// Scope an API key is bound to. Organization-level keys have no project or
/// environment, and project-level keys have no environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiKeyScope {
    pub organization_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A relationship tuple, as attached to a detailed resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawRelationship {
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
}

/// An item of `resource_instances/detailed`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceInstanceDetail {
    pub id: String,
    pub key: String,
    /// Key of the instance's resource type.
    pub resource: String,
    /// Id of the instance's resource type.
    #[serde(default)]
    pub resource_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relationships: Vec<RawRelationship>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceInstanceRole {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_instance: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssociatedTenant {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_instance_roles: Vec<ResourceInstanceRole>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserRole {
    pub role: String,
    pub tenant: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<UserRole>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub associated_tenants: Vec<AssociatedTenant>,
}

/// Body of role assignment and unassignment requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoleAssignmentRequest {
    pub user: String,
    pub role: String,
    pub tenant: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MappingRule {
    pub url: String,
    pub http_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub headers: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfigCreate {
    pub key: String,
    pub secret: String,
    pub name: String,
    pub auth_mechanism: String,
    pub mapping_rules: Vec<MappingRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub auth_mechanism: Option<String>,
    #[serde(default)]
    pub mapping_rules: Vec<MappingRule>,
}

// The API sends `null` for some collections it otherwise omits.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
