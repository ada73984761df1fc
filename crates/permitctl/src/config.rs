use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Configuration of a `permitctl` profile, persisted as JSON.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// API key used to authenticate, or None if no key is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// URL of the Permit REST API. If None, the profile default is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<url::Url>,

    /// Name of the profile this configuration was loaded from.
    #[serde(skip)]
    profile: String,
}

impl Config {
    /// Load the configuration of `profile`, or return a default if it doesn't exist.
    pub fn load(profile: &str) -> anyhow::Result<Self> {
        let config_file = Self::file_path(profile)?;
        let mut config = Self::load_from(&config_file)?;
        config.profile = profile.to_string();
        Ok(config)
    }

    pub fn load_from(config_file: &Path) -> anyhow::Result<Self> {
        let config = match std::fs::read(config_file) {
            Ok(v) => {
                let cfg = serde_json::from_slice(&v).with_context(|| {
                    format!(
                        "failed to parse permitctl config at {}",
                        config_file.display()
                    )
                })?;
                tracing::debug!(path = %config_file.display(), "loaded and used config");
                cfg
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %config_file.display(), "config file not found, using defaults");
                Config::default()
            }
            Err(err) => {
                return Err(err).context(format!(
                    "failed to read config at {}",
                    config_file.display()
                ))
            }
        };
        Ok(config)
    }

    /// Write the configuration of `profile`, replacing the file atomically.
    pub fn write(&self, profile: &str) -> anyhow::Result<()> {
        self.write_to(&Self::file_path(profile)?)
    }

    pub fn write_to(&self, config_file: &Path) -> anyhow::Result<()> {
        let dir = config_file
            .parent()
            .context("config file path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;

        let ser = serde_json::to_vec_pretty(self)?;
        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut temp_file, &ser)?;
        temp_file
            .persist(config_file)
            .context("persisting config file")?;

        tracing::debug!(path = %config_file.display(), "wrote config");
        Ok(())
    }

    pub fn file_path(profile: &str) -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(format!("{profile}.json")))
    }

    fn config_dir() -> anyhow::Result<PathBuf> {
        let path = dirs::config_dir()
            .context("couldn't determine user config directory")?
            .join("permitctl");
        Ok(path)
    }

    pub fn is_local(&self) -> bool {
        self.profile == "local"
    }

    /// URL of the REST API, falling back to the default of the profile.
    pub fn get_api_url(&self) -> &url::Url {
        if let Some(url) = &self.api_url {
            url
        } else if self.is_local() {
            &*permit_client::LOCAL_API_URL
        } else {
            &*permit_client::DEFAULT_API_URL
        }
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn clear_api_key(&mut self) -> Option<String> {
        self.api_key.take()
    }
}
