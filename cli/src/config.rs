// Relay service configuration
//
// Nothing is persisted: the relay is configured per invocation from flags
// and environment. `PORT` overrides the listen port (deployment platforms
// inject it); the default is 5000.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

/// Default listen port when neither `--port` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Port the websocket endpoint listens on.
    pub listen_port: u16,

    /// Address to bind.
    pub bind_addr: String,

    /// Maximum concurrent peer connections across all sessions.
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            bind_addr: "0.0.0.0".to_string(),
            max_connections: 1000,
        }
    }
}

impl RelayConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => config.listen_port = port,
                Err(_) => warn!(value = %port, "ignoring unparseable PORT override"),
            }
        }
        config
    }

    /// The socket address to serve on.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.listen_port)
            .parse()
            .context("Invalid bind address")
    }
}
