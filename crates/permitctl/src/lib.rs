use clap::Parser;

mod auth;
mod config;
pub mod graph;
mod output;
mod projects;
mod proxy;
pub mod select;
mod users;

use output::{Output, OutputType};

/// A command-line tool for working with Permit.io authorization data.
#[derive(Debug, Parser)]
#[clap(author, about, version)]
pub struct Cli {
    /// Configuration profile to use.
    ///
    /// Profiles are distinct configurations of the `permitctl` tool, and are
    /// completely optional. Use multiple profiles to track multiple API keys
    /// or development endpoints.
    #[clap(long, default_value = "default", env = "PERMITCTL_PROFILE", global = true)]
    profile: String,

    /// API key to use instead of the one stored in the profile.
    #[clap(long, env = "PERMIT_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// URL of the Permit REST API to use instead of the profile's.
    #[clap(long, env = "PERMIT_API_URL", global = true)]
    api_url: Option<url::Url>,

    #[clap(subcommand)]
    cmd: Command,

    #[clap(flatten)]
    output: Output,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Authenticate with Permit.
    Auth(auth::Auth),
    /// Work with the projects of your organization.
    Projects(projects::Projects),
    /// Work with the environments of a project.
    Envs(projects::Envs),
    /// Render the relationship graph of an environment.
    ///
    /// Graph fetches every resource instance of the environment along with
    /// its relationships, and every user along with their resource instance
    /// roles. Resource instances and users become nodes; relationships and
    /// role assignments become edges. The graph is written as a standalone
    /// HTML page which is then opened in your browser.
    Graph(graph::Graph),
    /// Work with the users of an environment and their role assignments.
    Users(users::Users),
    /// Work with API proxy configurations.
    Proxy(proxy::Proxy),
}

#[derive(Debug)]
pub struct CliContext {
    config: config::Config,
    output: output::Output,
    api_key: Option<String>,
    api_url: Option<url::Url>,
    client: Option<permit_client::Client>,
}

impl CliContext {
    /// Returns a client of the Permit API, creating a new one if necessary.
    /// This function will return an error if no API key is configured.
    pub fn client(&mut self) -> anyhow::Result<permit_client::Client> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let Some(api_key) = self.api_key().map(str::to_string) else {
            anyhow::bail!("You must run `auth token` first, or pass --api-key");
        };
        let client = self.unauthenticated_client().with_api_key(Some(api_key));
        self.client = Some(client.clone());
        Ok(client)
    }

    /// Returns a client which doesn't send an API key.
    pub fn unauthenticated_client(&self) -> permit_client::Client {
        permit_client::Client::new(self.api_url().clone(), None)
    }

    /// The API key of the command line or environment, else of the profile.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .or(self.config.api_key.as_deref())
    }

    pub fn api_url(&self) -> &url::Url {
        self.api_url
            .as_ref()
            .unwrap_or_else(|| self.config.get_api_url())
    }

    pub fn config_mut(&mut self) -> &mut config::Config {
        // Cached clients may carry a stale key.
        self.client = None;
        &mut self.config
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    pub fn write_all<I, T>(&mut self, items: I, table_alt: T::TableAlt) -> anyhow::Result<()>
    where
        T: output::CliOutput,
        I: IntoIterator<Item = T>,
    {
        match self.get_output_type() {
            OutputType::Json => output::print_json(items),
            OutputType::Yaml => output::print_yaml(items),
            OutputType::Table => output::print_table(table_alt, items),
        }
    }

    pub fn get_output_type(&mut self) -> OutputType {
        use crossterm::tty::IsTty;

        if let Some(ty) = self.output.output {
            ty
        } else if std::io::stdout().is_tty() {
            OutputType::Table
        } else {
            OutputType::Yaml
        }
    }
}

impl Cli {
    pub async fn run(&self) -> anyhow::Result<()> {
        let config = config::Config::load(&self.profile)?;
        let output = self.output.clone();
        let mut context = CliContext {
            config,
            output,
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
            client: None,
        };

        match &self.cmd {
            Command::Auth(auth) => auth.run(&mut context).await,
            Command::Projects(projects) => projects.run(&mut context).await,
            Command::Envs(envs) => envs.run(&mut context).await,
            Command::Graph(graph) => graph.run(&mut context).await,
            Command::Users(users) => users.run(&mut context).await,
            Command::Proxy(proxy) => proxy.run(&mut context).await,
        }?;

        context.config().write(&self.profile)?;

        Ok(())
    }
}
