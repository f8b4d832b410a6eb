//! Configuration resolution for the CWMP ACS.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/cwmp-acs/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete ACS configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cwmp: CwmpConfig,
}

/// HTTP server and storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // 7547 is the IANA port for CWMP.
            listen_addr: "0.0.0.0:7547".to_string(),
            database_path: None,
            max_body_bytes: 4 * 1024 * 1024, // 4 MB
            log_level: "info".to_string(),
        }
    }
}

/// CWMP engine behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CwmpConfig {
    /// Path the CPEs POST to (their configured ACS URL).
    pub endpoint_path: String,
    /// Upper bound for a single store call made while handling a message.
    pub store_timeout_secs: u64,
    /// How long a CWMP session cookie stays valid after the last message.
    pub session_ttl_secs: u64,
}

impl Default for CwmpConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/".to_string(),
            store_timeout_secs: 10,
            session_ttl_secs: 300,
        }
    }
}

impl CwmpConfig {
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` is a config file named on the command line; unlike the global
/// file it must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config);
    validate(&config)?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Default location of the ACS database.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("acs.db"))
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cwmp-acs"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("CWMP_ACS_LISTEN_ADDR") {
        config.server.listen_addr = val;
    }
    if let Ok(val) = std::env::var("CWMP_ACS_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("CWMP_ACS_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Ok(val) = std::env::var("CWMP_ACS_STORE_TIMEOUT_SECS") {
        if let Ok(n) = val.parse() {
            config.cwmp.store_timeout_secs = n;
        }
    }
    if let Ok(val) = std::env::var("CWMP_ACS_SESSION_TTL_SECS") {
        if let Ok(n) = val.parse() {
            config.cwmp.session_ttl_secs = n;
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if !config.cwmp.endpoint_path.starts_with('/') {
        return Err(Error::Config(format!(
            "endpoint_path must start with '/': {}",
            config.cwmp.endpoint_path
        )));
    }
    if config.cwmp.store_timeout_secs == 0 {
        return Err(Error::Config("store_timeout_secs must be positive".into()));
    }
    Ok(())
}
