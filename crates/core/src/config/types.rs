use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::packager::PackagerConfig;
use crate::queue::QueueConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub packager: PackagerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Events buffered per WebSocket subscriber before the slowest one lags.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Origins allowed to call the API from a browser; `"*"` allows any.
    /// Empty disables CORS headers entirely.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_buffer: default_event_buffer(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8340
}

fn default_event_buffer() -> usize {
    1024
}

/// Config as exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub packager: SanitizedPackagerConfig,
    pub queue: QueueConfig,
    pub server: ServerConfig,
}

/// Packager settings without the local interpreter path
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPackagerConfig {
    pub module: String,
    pub clean: bool,
    pub noconfirm: bool,
    pub python_path_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            packager: SanitizedPackagerConfig {
                module: config.packager.module.clone(),
                clean: config.packager.clean,
                noconfirm: config.packager.noconfirm,
                python_path_configured: !config.packager.python_path.as_os_str().is_empty(),
            },
            queue: config.queue.clone(),
            server: config.server.clone(),
        }
    }
}
