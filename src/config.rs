use crate::error::ExporterError;
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

/// Default location of the configuration file when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/apc-exporter/config.yaml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the UPS management card, e.g. `https://ups.local`
    pub ups_url: String,
    pub username: String,
    pub password: SecretString,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    10
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .add_source(
                config::Environment::with_prefix("APC_EXPORTER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scraper could never log in with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let url = self.ups_url.trim();
        if url.is_empty() {
            return Err(ExporterError::Config("ups_url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ExporterError::Config(format!(
                "ups_url must start with http:// or https://, got {}",
                url
            )));
        }
        if self.username.trim().is_empty() {
            return Err(ExporterError::Config(
                "username must not be empty".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ExporterError::Config(
                "request_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `ups_url` without a trailing slash, ready for path concatenation
    pub fn base_url(&self) -> &str {
        self.ups_url.trim().trim_end_matches('/')
    }
}
