use anyhow::Context;
use permit_client::client as api;

/// Selects the project and environment a command works in.
///
/// Either may be an id or a key. When omitted, the project and environment
/// of the API key's scope are used, and otherwise you're prompted to pick
/// one interactively.
#[derive(Debug, Clone, Default, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct ScopeArgs {
    /// Project id or key.
    #[clap(long, env = "PERMIT_PROJECT")]
    pub project: Option<String>,
    /// Environment id or key.
    #[clap(long, env = "PERMIT_ENV")]
    pub env: Option<String>,
}

/// A resolved project and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEnv {
    pub project: String,
    pub env: String,
}

impl ProjectEnv {
    pub fn facts_path(&self) -> String {
        api::facts_path(&self.project, &self.env)
    }
}

impl ScopeArgs {
    pub async fn resolve(&self, ctx: &mut crate::CliContext) -> anyhow::Result<ProjectEnv> {
        if let (Some(project), Some(env)) = (&self.project, &self.env) {
            return Ok(ProjectEnv {
                project: project.clone(),
                env: env.clone(),
            });
        }
        let client = ctx.client()?;

        let scope = api::fetch_api_key_scope(&client)
            .await
            .context("failed to fetch the scope of the API key")?;
        tracing::debug!(?scope, "resolved API key scope");

        let project = match (&self.project, scope.project_id) {
            (Some(project), _) => project.clone(),
            (None, Some(project)) => project,
            (None, None) => {
                let projects = api::fetch_projects(&client)
                    .await
                    .context("failed to fetch projects")?;
                let choices: Vec<Choice> = projects
                    .into_iter()
                    .map(|p| Choice {
                        label: p.name,
                        key: p.key,
                        value: p.id,
                    })
                    .collect();
                prompt_choice("Select a project", "--project", &choices)?
            }
        };

        // An environment of the key's scope only applies to the key's own project.
        let scoped_env = scope.environment_id.filter(|_| self.project.is_none());

        let env = match (&self.env, scoped_env) {
            (Some(env), _) => env.clone(),
            (None, Some(env)) => env,
            (None, None) => {
                let envs = api::fetch_environments(&client, &project)
                    .await
                    .context("failed to fetch environments")?;
                let choices: Vec<Choice> = envs
                    .into_iter()
                    .map(|e| Choice {
                        label: e.name,
                        key: e.key,
                        value: e.id,
                    })
                    .collect();
                prompt_choice("Select an environment", "--env", &choices)?
            }
        };

        Ok(ProjectEnv { project, env })
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub label: String,
    pub key: String,
    pub value: String,
}

/// Prompt for one of `choices` on the terminal, returning its value.
/// `flag` names the option to pass instead when there's no terminal.
pub fn prompt_choice(title: &str, flag: &str, choices: &[Choice]) -> anyhow::Result<String> {
    use crossterm::tty::IsTty;

    if choices.is_empty() {
        anyhow::bail!("{title}: there is nothing to choose from");
    }
    if !std::io::stdin().is_tty() {
        anyhow::bail!("{flag} is required when not running interactively");
    }

    eprintln!("{title}:");
    for (index, choice) in choices.iter().enumerate() {
        if choice.key.is_empty() || choice.key == choice.label {
            eprintln!("  {}) {}", index + 1, choice.label);
        } else {
            eprintln!("  {}) {} ({})", index + 1, choice.label, choice.key);
        }
    }

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = editor.readline(&format!("{title} [1-{}]: ", choices.len()))?;
        match parse_choice(&line, choices) {
            Some(index) => return Ok(choices[index].value.clone()),
            None => eprintln!("'{}' is not one of the choices", line.trim()),
        }
    }
}

/// Parse the answer to a choice prompt: a 1-based index, or an exact key or label.
pub fn parse_choice(input: &str, choices: &[Choice]) -> Option<usize> {
    let input = input.trim();

    if let Ok(n) = input.parse::<usize>() {
        return (1..=choices.len()).contains(&n).then(|| n - 1);
    }
    choices
        .iter()
        .position(|c| c.key == input)
        .or_else(|| choices.iter().position(|c| c.label == input))
}

/// Prompt for a required free-form value, re-asking while the answer is blank.
pub fn prompt_value(prompt: &str, flag: &str) -> anyhow::Result<String> {
    use crossterm::tty::IsTty;

    if !std::io::stdin().is_tty() {
        anyhow::bail!("{flag} is required when not running interactively");
    }
    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = editor.readline(&format!("{prompt}: "))?;
        let line = line.trim();
        if !line.is_empty() {
            return Ok(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<Choice> {
        vec![
            Choice {
                label: "Default Project".to_string(),
                key: "default".to_string(),
                value: "p-1".to_string(),
            },
            Choice {
                label: "Billing".to_string(),
                key: "billing".to_string(),
                value: "p-2".to_string(),
            },
        ]
    }

    #[test]
    fn choices_parse_by_index_key_or_label() {
        let choices = choices();
        assert_eq!(parse_choice("1", &choices), Some(0));
        assert_eq!(parse_choice(" 2\n", &choices), Some(1));
        assert_eq!(parse_choice("billing", &choices), Some(1));
        assert_eq!(parse_choice("Default Project", &choices), Some(0));
    }

    #[test]
    fn out_of_range_and_unknown_choices_are_rejected() {
        let choices = choices();
        assert_eq!(parse_choice("0", &choices), None);
        assert_eq!(parse_choice("3", &choices), None);
        assert_eq!(parse_choice("nope", &choices), None);
        assert_eq!(parse_choice("", &choices), None);
    }

    #[test]
    fn facts_path_of_scope() {
        let scope = ProjectEnv {
            project: "p".to_string(),
            env: "e".to_string(),
        };
        assert_eq!(scope.facts_path(), "v2/facts/p/e");
    }
}
