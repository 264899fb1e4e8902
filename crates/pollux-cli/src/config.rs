//! CLI configuration file and environment overrides.
//!
//! ```yaml
//! policy:
//!   initial_interval_ms: 500
//!   backoff_factor: 1.5
//!   timeout_ms: 300000
//! backend:
//!   name: http
//!   endpoint: https://jobs.example.com/api
//!   token_env: POLLUX_API_KEY
//! state_dir: /var/lib/pollux
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pollux_adapter_http::DEFAULT_TOKEN_ENV;
use pollux_engine::PollPolicy;
use pollux_hal::BackendConfig;
use serde::Deserialize;

/// Overrides the backend endpoint.
pub const ENDPOINT_ENV: &str = "POLLUX_ENDPOINT";
/// Overrides the state directory.
pub const STATE_DIR_ENV: &str = "POLLUX_STATE_DIR";

/// Contents of the CLI config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Polling policy for `run`.
    pub policy: PollPolicy,
    /// Backend selection and settings.
    pub backend: BackendSection,
    /// Where results are persisted.
    pub state_dir: Option<PathBuf>,
}

/// `backend:` section of the config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub name: String,
    pub endpoint: Option<String>,
    pub token_env: Option<String>,
    /// Backend-specific settings passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            name: "simulator".to_string(),
            endpoint: None,
            token_env: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl CliConfig {
    /// Load the config and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `config.yaml` in the
    /// default state directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env = |var: &str| std::env::var(var).ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?.ok_or_else(|| {
                anyhow::anyhow!("Config file not found: {}", path.display())
            })?,
            None => {
                let default_path = default_state_dir(env)?.join("config.yaml");
                Self::from_file(&default_path)?.unwrap_or_default()
            }
        };
        config.apply_env(env);
        Ok(config)
    }

    /// Parse a config file, returning `None` if it does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        Self::from_yaml(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))
            .map(Some)
    }

    /// Parse config from YAML text. Empty text yields the defaults.
    pub fn from_yaml(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(source)?;
        config
            .policy
            .validate()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(config)
    }

    /// Apply `POLLUX_ENDPOINT` and `POLLUX_STATE_DIR`.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = env(ENDPOINT_ENV) {
            self.backend.endpoint = Some(endpoint);
        }
        if let Some(dir) = env(STATE_DIR_ENV) {
            self.state_dir = Some(PathBuf::from(dir));
        }
    }

    /// Build the configuration for backend `name`.
    ///
    /// The token is read from the variable named by `token_env`.
    pub fn backend_config(
        &self,
        name: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> BackendConfig {
        let mut config = BackendConfig::new(name);
        config.extra = self.backend.extra.clone();
        if let Some(endpoint) = &self.backend.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        let token_env = self.backend.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        if let Some(token) = env(token_env) {
            config = config.with_token(token);
        }
        config.with_extra("token_env", token_env.into())
    }

    /// Directory for persisted results.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir(|var| std::env::var(var).ok()),
        }
    }
}

/// `$POLLUX_STATE_DIR`, or `~/.pollux/`.
pub fn default_state_dir(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(dir) = env(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".pollux"))
}
