use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use fd_backend::interpret::DEFAULT_RECORD_KEYS;
use fd_backend::{CognitoPasswordSource, CommandTokenSource, CredentialProvider, CredentialSource};
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when no `password_cmd` is configured.
pub const PASSWORD_ENV: &str = "FLEETDESK_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("no password: FLEETDESK_PASSWORD not set and password_cmd gave nothing")]
    Password,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub agent: AgentConfig,
    pub store: StoreConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub region: String,
    /// Cognito app client id for the user-password sign-in.
    pub client_id: Option<String>,
    pub username: Option<String>,
    /// Command printing the password (run via `sh -c`).
    pub password_cmd: Option<String>,
    /// Command printing a ready bearer token. Takes precedence over sign-in.
    pub token_cmd: Option<String>,
    /// How long a token from `token_cmd` is trusted.
    pub token_ttl_secs: u64,
    /// Identity endpoint override; defaults to the regional Cognito endpoint.
    pub endpoint: Option<String>,
    /// Refresh this many seconds before the credential expires.
    pub refresh_margin_secs: u64,
    /// Give up on a sign-in or token command after this many seconds.
    pub exchange_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            client_id: None,
            username: None,
            password_cmd: None,
            token_cmd: None,
            token_ttl_secs: 3600,
            endpoint: None,
            refresh_margin_secs: 60,
            exchange_timeout_secs: 30,
        }
    }
}

impl IdentityConfig {
    /// Resolve the password from password_cmd or the FLEETDESK_PASSWORD env var.
    pub fn resolve_password(&self) -> Result<String, ConfigError> {
        if let Some(cmd) = &self.password_cmd {
            match Command::new("sh").arg("-c").arg(cmd).output() {
                Ok(output) if output.status.success() => {
                    let password = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !password.is_empty() {
                        return Ok(password);
                    }
                }
                Ok(output) => warn!("password_cmd exited with {}", output.status),
                Err(e) => warn!("password_cmd could not run: {e}"),
            }
        }

        std::env::var(PASSWORD_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Password)
    }

    /// Pick the credential source this configuration describes.
    pub fn credential_source(&self, http: &Client) -> Result<Box<dyn CredentialSource>, ConfigError> {
        if let Some(cmd) = &self.token_cmd {
            return Ok(Box::new(CommandTokenSource::new(
                cmd.clone(),
                Duration::from_secs(self.token_ttl_secs),
            )));
        }

        let username = self
            .username
            .as_deref()
            .ok_or(ConfigError::Missing("identity.username or identity.token_cmd"))?;
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(ConfigError::Missing("identity.client_id"))?;
        let password = self.resolve_password()?;

        let mut source =
            CognitoPasswordSource::new(http.clone(), &self.region, client_id, username, password);
        if let Some(endpoint) = &self.endpoint {
            source = source.with_endpoint(endpoint.clone());
        }
        Ok(Box::new(source))
    }

    pub fn credential_provider(&self, http: &Client) -> Result<CredentialProvider, ConfigError> {
        Ok(CredentialProvider::from_boxed(self.credential_source(http)?)
            .with_margin(Duration::from_secs(self.refresh_margin_secs))
            .with_exchange_timeout(Duration::from_secs(self.exchange_timeout_secs)))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Object keys that mark an embedded record payload in a reply.
    pub record_keys: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 60,
            record_keys: DEFAULT_RECORD_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: fd_protocol::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Self {
        let path = config_path();
        if !path.exists() {
            return Config::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("{e}; using defaults");
            Config::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("fleetdesk").join("config.toml")
}
