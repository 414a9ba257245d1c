//! Layered configuration loading using figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`DICTIONARY_*` prefix, `__` between sections)
//! 2. A TOML file: the path given on the command line, else
//!    `dictionary.toml` in the working directory when present
//! 3. Built-in defaults
//!
//! `DICTIONARY_SERVER__PORT=8080` maps to `server.port`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "DICTIONARY_";
pub const DEFAULT_CONFIG_FILE: &str = "dictionary.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin; the browser front-end is served from elsewhere.
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3001
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "dictionary.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Page size when a search request gives no `limit`.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Upper bound applied to any requested `limit`.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

const fn default_limit() -> u64 {
    20
}

const fn default_max_limit() -> u64 {
    100
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl DictionaryConfig {
    /// Load from defaults, the TOML file and the environment, then validate.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `.env`, then extracts without validating so command-line
    /// overrides can still be applied; call [`DictionaryConfig::validate`]
    /// afterwards.
    pub fn load_with_dotenv(file: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(Self::figment(file).extract()?)
    }

    /// The provider chain, public so tests can layer providers on top.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let path = file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if file.is_some() || path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(ConfigError::InvalidValue {
                field: "search.default_limit".into(),
                reason: format!("must be between 1 and {}", self.search.max_limit),
            });
        }
        self.validate_host()
    }

    fn validate_host(&self) -> Result<(), ConfigError> {
        let host = &self.server.host;
        let is_name = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if self.bind_ip().is_some() || is_name {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                field: "server.host".into(),
                reason: format!("'{host}' is neither an IP address nor a host name"),
            })
        }
    }

    /// The listen address when `server.host` is an IP literal. IPv6 may be
    /// written with or without brackets. `None` for host names.
    pub fn bind_ip(&self) -> Option<SocketAddr> {
        let host = self.server.host.trim_start_matches('[').trim_end_matches(']');
        host.parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.server.port))
    }

    /// Resolves the listen address, looking up host names such as
    /// `localhost`. The first resolved address wins.
    pub async fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        if let Some(addr) = self.bind_ip() {
            return Ok(addr);
        }

        let unresolved = |reason: String| ConfigError::InvalidValue {
            field: "server.host".into(),
            reason,
        };
        let mut addrs = tokio::net::lookup_host((self.server.host.as_str(), self.server.port))
            .await
            .map_err(|e| unresolved(e.to_string()))?;
        addrs
            .next()
            .ok_or_else(|| unresolved(format!("'{}' resolved to no addresses", self.server.host)))
    }
}
