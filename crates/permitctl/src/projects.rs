use crate::output::{to_table_row, CliOutput, JsonCell};
use anyhow::Context;
use permit_client::client as api;
use permit_client::models;
use serde::Serialize;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Projects {
    #[clap(subcommand)]
    cmd: ProjectsCommand,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum ProjectsCommand {
    /// List the projects visible to your API key.
    List,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Envs {
    #[clap(subcommand)]
    cmd: EnvsCommand,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum EnvsCommand {
    /// List the environments of a project.
    List(ListEnvs),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct ListEnvs {
    /// Project id or key. Defaults to the project of the API key.
    #[clap(long, env = "PERMIT_PROJECT")]
    project: Option<String>,
}

impl Projects {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        match &self.cmd {
            ProjectsCommand::List => {
                let client = ctx.client()?;
                let projects = api::fetch_projects(&client)
                    .await
                    .context("failed to fetch projects")?;
                ctx.write_all(projects.into_iter().map(Row::from), ())
            }
        }
    }
}

impl Envs {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        match &self.cmd {
            EnvsCommand::List(ListEnvs { project }) => {
                let client = ctx.client()?;
                let project = match project {
                    Some(project) => project.clone(),
                    None => api::fetch_api_key_scope(&client)
                        .await
                        .context("failed to fetch the scope of the API key")?
                        .project_id
                        .context("--project is required for keys which aren't bound to a project")?,
                };
                let envs = api::fetch_environments(&client, &project)
                    .await
                    .context("failed to fetch environments")?;
                ctx.write_all(envs.into_iter().map(Row::from), ())
            }
        }
    }
}

/// A project or environment listing row.
#[derive(Serialize)]
struct Row {
    id: String,
    key: String,
    name: String,
    description: Option<String>,
}

impl From<models::Project> for Row {
    fn from(p: models::Project) -> Self {
        Self {
            id: p.id,
            key: p.key,
            name: p.name,
            description: p.description,
        }
    }
}

impl From<models::Environment> for Row {
    fn from(e: models::Environment) -> Self {
        Self {
            id: e.id,
            key: e.key,
            name: e.name,
            description: e.description,
        }
    }
}

impl CliOutput for Row {
    type TableAlt = ();
    type CellValue = JsonCell;

    fn table_headers(_alt: Self::TableAlt) -> Vec<&'static str> {
        vec!["Key", "Name", "Id", "Description"]
    }

    fn into_table_row(self, _alt: Self::TableAlt) -> Vec<Self::CellValue> {
        to_table_row(self, &["/key", "/name", "/id", "/description"])
    }
}
