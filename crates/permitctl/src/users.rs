use anyhow::Context;
use permit_client::models;
use permit_client::pagination::{self, PageBody, PageRequest, PageSource};
use serde::Serialize;

use crate::output::CliOutput;
use crate::select::{ProjectEnv, ScopeArgs};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Users {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List the users of an environment with their roles.
    List(List),
    /// Assign a role to a user within a tenant.
    Assign(Assignment),
    /// Remove a role of a user within a tenant.
    Unassign(Assignment),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct List {
    #[clap(flatten)]
    scope: ScopeArgs,
    /// Only list users of this tenant.
    #[clap(long)]
    tenant: Option<String>,
    /// Only list users having this role.
    #[clap(long)]
    role: Option<String>,
    /// Page to list, starting at 1.
    #[clap(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,
    /// Number of users per page.
    #[clap(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    per_page: u32,
    /// List every page of users.
    #[clap(long, conflicts_with = "page")]
    all: bool,
    /// Show user keys in full rather than truncated.
    #[clap(long)]
    expand_key: bool,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Assignment {
    #[clap(flatten)]
    scope: ScopeArgs,
    /// Key of the user.
    #[clap(long)]
    user: String,
    /// Key of the role.
    #[clap(long)]
    role: String,
    /// Key of the tenant.
    #[clap(long)]
    tenant: String,
}

impl Users {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        match &self.cmd {
            Command::List(list) => do_list(ctx, list).await,
            Command::Assign(assignment) => do_assign(ctx, assignment, true).await,
            Command::Unassign(assignment) => do_assign(ctx, assignment, false).await,
        }
    }
}

impl List {
    fn request(&self, scope: &ProjectEnv) -> PageRequest {
        let path = match &self.tenant {
            Some(tenant) => format!("{}/tenants/{tenant}/users", scope.facts_path()),
            None => format!("{}/users", scope.facts_path()),
        };
        let mut request = PageRequest::new(path).per_page(self.per_page);

        if let Some(role) = &self.role {
            request = request.param("role", role);
        }
        if self.all {
            request
        } else {
            request.page(self.page)
        }
    }
}

async fn do_list(ctx: &mut crate::CliContext, list: &List) -> anyhow::Result<()> {
    let scope = list.scope.resolve(ctx).await?;
    let client = ctx.client()?;
    let request = list.request(&scope);

    let (users, total_count) = if list.all {
        pagination::fetch_all_by_count::<_, models::User>(&client, request)
            .await
            .context("failed to fetch users")?
    } else {
        let body = client
            .fetch_page(request.path(), &request.query())
            .await
            .context("failed to fetch users")?;
        let page = PageBody::<models::User>::from_value(body)?;
        let total_count = page.total_count();
        let users = page.into_items();
        let total_count = total_count.unwrap_or(users.len() as u64);
        (users, total_count)
    };

    let first = if list.all {
        1
    } else {
        (list.page as u64 - 1) * list.per_page as u64 + 1
    };
    if list.all {
        eprintln!("Showing {} of {total_count} users", users.len());
    } else {
        eprintln!(
            "Showing {} of {total_count} users | Page {}",
            users.len(),
            list.page
        );
    }

    let rows = users
        .into_iter()
        .zip(first..)
        .map(|(user, index)| UserRow::new(index, user));
    ctx.write_all(rows, list.expand_key)
}

async fn do_assign(
    ctx: &mut crate::CliContext,
    assignment: &Assignment,
    assign: bool,
) -> anyhow::Result<()> {
    let scope = assignment.scope.resolve(ctx).await?;
    let client = ctx.client()?;

    let path = format!("{}/role_assignments", scope.facts_path());
    let body = models::RoleAssignmentRequest {
        user: assignment.user.clone(),
        role: assignment.role.clone(),
        tenant: assignment.tenant.clone(),
    };

    if assign {
        let created: serde_json::Value = client
            .post_json(&path, &body)
            .await
            .context("failed to assign role")?;
        tracing::debug!(%created, "assigned role");
        println!(
            "Assigned role '{}' to user '{}' in tenant '{}'",
            body.role, body.user, body.tenant
        );
    } else {
        let _: serde_json::Value = client
            .delete_json(&path, &body)
            .await
            .context("failed to unassign role")?;
        println!(
            "Unassigned role '{}' from user '{}' in tenant '{}'",
            body.role, body.user, body.tenant
        );
    }
    Ok(())
}

/// A user as listed, numbered from 1 across pages.
#[derive(Serialize, Debug)]
struct UserRow {
    #[serde(rename = "#")]
    index: u64,
    key: String,
    email: String,
    first_name: String,
    last_name: String,
    roles: Vec<models::UserRole>,
}

impl UserRow {
    fn new(index: u64, user: models::User) -> Self {
        Self {
            index,
            key: user.key,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
        }
    }
}

impl CliOutput for UserRow {
    /// Whether to show keys in full.
    type TableAlt = bool;
    type CellValue = String;

    fn table_headers(_alt: Self::TableAlt) -> Vec<&'static str> {
        vec!["#", "key", "email", "first_name", "last_name", "tenant", "roles"]
    }

    fn into_table_row(self, expand_key: Self::TableAlt) -> Vec<Self::CellValue> {
        let key = if expand_key {
            self.key
        } else {
            truncate(&self.key)
        };
        vec![
            self.index.to_string(),
            key,
            self.email,
            self.first_name,
            self.last_name,
            tenant(&self.roles),
            format_roles(&self.roles),
        ]
    }
}

/// Long keys are cut to their first seven characters.
fn truncate(key: &str) -> String {
    match key.char_indices().nth(7) {
        Some((end, _)) => format!("{}...", &key[..end]),
        None => key.to_string(),
    }
}

/// The (truncated) tenant of the first role.
fn tenant(roles: &[models::UserRole]) -> String {
    roles
        .first()
        .map(|role| truncate(&role.tenant))
        .unwrap_or_default()
}

fn format_roles(roles: &[models::UserRole]) -> String {
    itertools::join(roles.iter().map(|r| r.role.as_str()), "\n")
}
