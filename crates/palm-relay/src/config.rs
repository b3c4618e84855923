//! Relay configuration.
//!
//! Layered, lowest priority first: compiled defaults, the TOML config file,
//! `PALM__*` environment variables. Command-line flags are applied on top by
//! the binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "palm";

/// Backend address used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4096";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Agent backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the agent backend; the relay POSTs to `<url>/chat`.
    pub url: String,
    /// Seconds to wait for the TCP connection to the backend.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load the config file (if present) and environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let built = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&env_prefix())
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading config from {}", path.display()))?;

        built
            .try_deserialize()
            .with_context(|| format!("parsing config from {}", path.display()))
    }

    /// Load the config, writing a default file first if none exists.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            write_default_config(path)?;
        }
        Self::load(path)
    }
}

/// Resolve the config file path: an explicit override (file or directory) or
/// `<config dir>/palm/config.toml`.
pub fn config_path(override_path: Option<&str>) -> Result<PathBuf> {
    match override_path {
        Some(raw) => {
            let expanded = shellexpand::full(raw)
                .with_context(|| format!("expanding config path {raw}"))?;
            let path = PathBuf::from(expanded.as_ref());
            if path.is_dir() {
                Ok(path.join("config.toml"))
            } else {
                Ok(path)
            }
        }
        None => {
            let base = dirs::config_dir()
                .ok_or_else(|| anyhow!("unable to determine the config directory"))?;
            Ok(base.join(APP_NAME).join("config.toml"))
        }
    }
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let toml = toml::to_string_pretty(&RelayConfig::default())
        .context("serializing default config to TOML")?;
    let mut body = format!("# Configuration for {APP_NAME}-relay\n");
    body.push_str("# Environment overrides use the ");
    body.push_str(&env_prefix());
    body.push_str("__SECTION__KEY form, e.g. PALM__BACKEND__URL.\n\n");
    body.push_str(&toml);

    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn env_prefix() -> String {
    APP_NAME.to_uppercase()
}
