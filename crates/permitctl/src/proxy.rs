use anyhow::Context;
use permit_client::models;
use serde::Serialize;

use crate::output::{to_table_row, CliOutput, JsonCell};
use crate::select::{prompt_value, ScopeArgs};

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Proxy {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Create a proxy configuration.
    ///
    /// A proxy configuration holds the secret the Permit proxy authenticates
    /// to a backend with, and the rules mapping backend URLs to resources and
    /// actions. Missing keys, secrets, and names are prompted for.
    Create(Create),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Create {
    #[clap(flatten)]
    scope: ScopeArgs,
    /// Key of the proxy configuration.
    #[clap(long)]
    key: Option<String>,
    /// Secret sent to the backend, such as an API token.
    #[clap(long, env = "PERMIT_PROXY_SECRET", hide_env_values = true)]
    secret: Option<String>,
    /// Display name of the proxy configuration.
    #[clap(long)]
    name: Option<String>,
    /// How the secret is sent to the backend.
    #[clap(long, default_value = "Bearer")]
    auth_mechanism: String,
    /// Mapping rules as a JSON array, for example
    /// '[{"url": "https://api.example.com/items", "http_method": "get", "resource": "item", "action": "read"}]'.
    #[clap(long, value_parser = parse_mapping_rules)]
    mapping_rules: Option<MappingRules>,
}

#[derive(Debug, Clone)]
struct MappingRules(Vec<models::MappingRule>);

fn parse_mapping_rules(s: &str) -> Result<MappingRules, String> {
    serde_json::from_str(s)
        .map(MappingRules)
        .map_err(|err| format!("invalid mapping rules: {err}"))
}

impl Proxy {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Create(create) => do_create(ctx, create).await,
        }
    }
}

impl Create {
    /// The body of the create request, prompting for missing values.
    fn body(&self) -> anyhow::Result<models::ProxyConfigCreate> {
        let or_prompt = |value: &Option<String>, prompt: &str, flag: &str| match value {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => prompt_value(prompt, flag),
        };

        Ok(models::ProxyConfigCreate {
            key: or_prompt(&self.key, "Proxy key", "--key")?,
            secret: or_prompt(&self.secret, "Proxy secret", "--secret")?,
            name: or_prompt(&self.name, "Proxy name", "--name")?,
            auth_mechanism: self.auth_mechanism.clone(),
            mapping_rules: self
                .mapping_rules
                .clone()
                .map(|MappingRules(rules)| rules)
                .unwrap_or_default(),
        })
    }
}

async fn do_create(ctx: &mut crate::CliContext, create: &Create) -> anyhow::Result<()> {
    let scope = create.scope.resolve(ctx).await?;
    let body = create.body()?;
    let client = ctx.client()?;

    let created: models::ProxyConfig = client
        .post_json(&format!("{}/proxy_configs", scope.facts_path()), &body)
        .await
        .context("failed to create proxy config")?;

    tracing::info!(key = %created.key, id = %created.id, "created proxy config");
    eprintln!("Proxy config created successfully!");

    ctx.write_all(Some(Row::from(created)), ())
}

#[derive(Serialize)]
struct Row {
    id: String,
    key: String,
    name: String,
    auth_mechanism: Option<String>,
    mapping_rules: usize,
}

impl From<models::ProxyConfig> for Row {
    fn from(config: models::ProxyConfig) -> Self {
        Self {
            id: config.id,
            key: config.key,
            name: config.name,
            auth_mechanism: config.auth_mechanism,
            mapping_rules: config.mapping_rules.len(),
        }
    }
}

impl CliOutput for Row {
    type TableAlt = ();
    type CellValue = JsonCell;

    fn table_headers(_alt: Self::TableAlt) -> Vec<&'static str> {
        vec!["Key", "Name", "Id", "Auth Mechanism", "Mapping Rules"]
    }

    fn into_table_row(self, _alt: Self::TableAlt) -> Vec<Self::CellValue> {
        to_table_row(
            self,
            &["/key", "/name", "/id", "/auth_mechanism", "/mapping_rules"],
        )
    }
}
