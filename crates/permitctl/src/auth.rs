use anyhow::Context;
use permit_client::client as api;
use permit_client::TokenType;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Auth {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Authenticate to Permit using an API key.
    ///
    /// You can find API keys within the Permit dashboard under "Settings".
    /// The key is verified against the API and then stored in the profile.
    Token(Token),
    /// Show the organization, project, and environment of the current API key.
    Status,
    /// Remove the API key stored in the profile.
    Logout,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Token {
    #[clap(long)]
    token: String,
}

impl Auth {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> Result<(), anyhow::Error> {
        match &self.cmd {
            Command::Token(Token { token }) => do_token(ctx, token).await,
            Command::Status => do_status(ctx).await,
            Command::Logout => {
                if ctx.config_mut().clear_api_key().is_some() {
                    println!("Removed the stored API key.");
                } else {
                    println!("No API key was stored.");
                }
                Ok(())
            }
        }
    }
}

async fn do_token(ctx: &mut crate::CliContext, token: &str) -> anyhow::Result<()> {
    let token = token.trim();
    check_api_key(token)?;

    let client = ctx
        .unauthenticated_client()
        .with_api_key(Some(token.to_string()));
    let scope = api::fetch_api_key_scope(&client)
        .await
        .context("failed to verify the API key")?;

    ctx.config_mut().set_api_key(token.to_string());
    tracing::info!(?scope, "configured API key");

    println!(
        "Configured API key of organization '{}'.",
        scope.organization_id
    );
    Ok(())
}

fn check_api_key(token: &str) -> anyhow::Result<()> {
    match permit_client::token_type(token) {
        TokenType::ApiToken => Ok(()),
        TokenType::AccessToken | TokenType::Unknown => anyhow::bail!(
            "Invalid API Key. Please provide a valid API Key (they begin with '{}').",
            permit_client::API_KEY_PREFIX
        ),
    }
}

async fn do_status(ctx: &mut crate::CliContext) -> anyhow::Result<()> {
    if ctx.api_key().is_none() {
        println!("You are not logged in. Run `permitctl auth token` to log in.");
        return Ok(());
    }
    let client = ctx.client()?;
    let scope = api::fetch_api_key_scope(&client)
        .await
        .context("failed to fetch the scope of the API key")?;

    // Names are fetched independently so that one failure still shows the rest.
    let mut errors = Vec::new();

    let org = match api::fetch_organization(&client, &scope.organization_id).await {
        Ok(org) => org.name,
        Err(err) => {
            errors.push(format!("organization: {err:#}"));
            scope.organization_id.clone()
        }
    };
    let project = match &scope.project_id {
        Some(project) => match api::fetch_project(&client, project).await {
            Ok(p) => Some(p.name),
            Err(err) => {
                errors.push(format!("project: {err:#}"));
                Some(project.clone())
            }
        },
        None => None,
    };
    let env = match (&scope.project_id, &scope.environment_id) {
        (Some(project), Some(env)) => match api::fetch_environment(&client, project, env).await {
            Ok(e) => Some(e.name),
            Err(err) => {
                errors.push(format!("environment: {err:#}"));
                Some(env.clone())
            }
        },
        _ => None,
    };

    println!("You are logged in:");
    println!("Organization: {org}");
    println!("Project: {}", project.as_deref().unwrap_or("(all projects)"));
    println!("Environment: {}", env.as_deref().unwrap_or("(all environments)"));

    for error in errors {
        tracing::warn!(%error, "failed to fetch a scope name");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_api_keys_are_accepted() {
        assert!(check_api_key("permit_key_0123456789").is_ok());

        let err = check_api_key("eyJhbGciOi.eyJzdWIiOi.c2lnbmF0dXJl").unwrap_err();
        assert!(err.to_string().starts_with("Invalid API Key"));
        assert!(check_api_key("not-a-key").is_err());
    }
}
