//! Client configuration loading

use super::ClientError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings needed to reach the booking API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL including the `/api` prefix
    pub base_url: String,

    /// Static client API key sent as `X-API-Key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Override the default user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            api_key: None,
            timeout_secs: 10,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional file plus `CINEMA_*` environment
    /// variables, on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong
    /// type.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url)
            .and_then(|b| b.set_default("timeout_secs", defaults.timeout_secs))
            .map_err(config_error)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("CINEMA"))
            .build()
            .map_err(config_error)?;

        settings.try_deserialize().map_err(config_error)
    }
}

fn config_error(err: config::ConfigError) -> ClientError {
    ClientError::Configuration(err.to_string())
}
