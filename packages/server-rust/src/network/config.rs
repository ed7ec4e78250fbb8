//! Network configuration for the HTTP surface.

use std::time::Duration;

/// Default port used when `MCP_SERVER_PORT` is set to `0`.
pub const DEFAULT_PORT: u16 = 9000;

/// Top-level network configuration for the server.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete. Must exceed the
    /// operation timeout so the pipeline reports its own timeouts.
    pub request_timeout: Duration,
    /// How long in-flight requests may run after a shutdown signal.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(150),
            drain_timeout: Duration::from_secs(30),
        }
    }
}
