// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::ResearchError;
use crate::infra::paths;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/v1/research";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where research sessions are streamed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the URL parameter carrying the research query.
    #[serde(default = "default_query_param")]
    pub query_param: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            query_param: default_query_param(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl StreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_query_param() -> String {
    "query".into()
}

fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".into()
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> Result<Self, ResearchError> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ResearchError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ResearchError> {
        if self.stream.query_param.trim().is_empty() {
            return Err(ResearchError::Config(
                "stream.query_param must not be empty".into(),
            ));
        }
        url::Url::parse(&self.stream.endpoint)?;
        Ok(())
    }
}
