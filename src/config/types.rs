//! Root configuration struct.

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Root configuration, deserialized from `config.json` merged over the
/// compiled defaults.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Listening port for the combined HTTP + WebSocket surface
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Sanity checks applied at startup and by `--validate-config`.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.port == 0 {
        anyhow::bail!("port must be non-zero");
    }
    if config.server.web_root.trim().is_empty() {
        anyhow::bail!("server.web_root must not be empty");
    }
    if config.server.session_timeout_secs == 0 {
        anyhow::bail!("server.session_timeout_secs must be at least 1");
    }
    Ok(())
}
