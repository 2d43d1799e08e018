use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ─── ServerConfig ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Serialize lifecycle hook delivery across the process
    #[serde(default)]
    pub strict_event_ordering: bool,

    /// How many completed requests the live feed keeps (1–10 000)
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}
fn default_recent_capacity() -> usize {
    200
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            strict_event_ordering: false,
            recent_capacity: default_recent_capacity(),
            log_filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Loads from a JSON file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_capacity == 0 || self.recent_capacity > 10_000 {
            return Err(ConfigError::Invalid(
                "recent_capacity must be between 1 and 10000".into(),
            ));
        }
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_addr must not be empty".into()));
        }
        Ok(())
    }
}
