//! Command line, environment configuration, and logging setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::clients::robot::DEFAULT_URL_TEMPLATE;
use crate::network::{NetworkConfig, DEFAULT_PORT};
use crate::service::ServerConfig;
use crate::tenant::MysqlSettings;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "robot_mcp_server=info,robot_mcp_core=info,warn";

/// Extra time the HTTP layer allows on top of the operation timeout, so the
/// pipeline reports its own timeouts.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Startup validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MCP_SERVER_PORT must be between 1 and 65535, got {0}")]
    InvalidPort(i64),
    #[error("robot client URL template must contain {{robot_code}}: {0}")]
    InvalidUrlTemplate(String),
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve MCP over stdin/stdout.
    #[default]
    Stdio,
    /// Serve the webhook, health probes, and MCP streamable HTTP on `/mcp`.
    Http,
}

/// WeChat robot MCP server.
#[derive(Debug, Parser)]
#[command(name = "robot-mcp-server", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// HTTP listen port; 0 selects the default.
    #[arg(long, env = "MCP_SERVER_PORT", allow_negative_numbers = true)]
    pub port: i64,

    #[arg(long, env = "MYSQL_HOST", default_value = "127.0.0.1")]
    pub mysql_host: String,

    #[arg(long, env = "MYSQL_PORT", default_value_t = 3306)]
    pub mysql_port: u16,

    #[arg(long, env = "MYSQL_USER", default_value = "")]
    pub mysql_user: String,

    #[arg(long, env = "MYSQL_PASSWORD", default_value = "", hide_env_values = true)]
    pub mysql_password: String,

    /// Robot client base URL; `{robot_code}` and `{port}` are substituted.
    #[arg(long, env = "ROBOT_CLIENT_URL_TEMPLATE", default_value = DEFAULT_URL_TEMPLATE)]
    pub robot_client_url_template: String,

    #[arg(long, env = "OPERATION_TIMEOUT_SECS", default_value_t = 120)]
    pub operation_timeout_secs: u64,

    #[arg(long, env = "MAX_CONCURRENT_OPERATIONS", default_value_t = 256)]
    pub max_concurrent_operations: u32,

    /// Deadline for building one tenant's connection pool.
    #[arg(long, env = "TENANT_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub tenant_connect_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }

    /// Checks everything that can be checked before touching the network.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_port()?;
        if !self.robot_client_url_template.contains("{robot_code}") {
            return Err(ConfigError::InvalidUrlTemplate(
                self.robot_client_url_template.clone(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(ConfigError::NotPositive {
                name: "OPERATION_TIMEOUT_SECS",
            });
        }
        if self.max_concurrent_operations == 0 {
            return Err(ConfigError::NotPositive {
                name: "MAX_CONCURRENT_OPERATIONS",
            });
        }
        if self.tenant_connect_timeout_secs == 0 {
            return Err(ConfigError::NotPositive {
                name: "TENANT_CONNECT_TIMEOUT_SECS",
            });
        }
        Ok(())
    }

    /// Port to bind; `0` maps to [`DEFAULT_PORT`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidPort` outside `0..=65535`.
    pub fn listen_port(&self) -> Result<u16, ConfigError> {
        match self.port {
            0 => Ok(DEFAULT_PORT),
            p => u16::try_from(p).map_err(|_| ConfigError::InvalidPort(p)),
        }
    }

    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            operation_timeout_ms: self.operation_timeout_secs.saturating_mul(1000),
            max_concurrent_operations: self.max_concurrent_operations,
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidPort` when the port is out of range.
    pub fn network_config(&self) -> Result<NetworkConfig, ConfigError> {
        Ok(NetworkConfig {
            port: self.listen_port()?,
            request_timeout: Duration::from_secs(self.operation_timeout_secs)
                + HTTP_TIMEOUT_MARGIN,
            ..NetworkConfig::default()
        })
    }

    #[must_use]
    pub fn mysql_settings(&self) -> MysqlSettings {
        MysqlSettings {
            host: self.mysql_host.clone(),
            port: self.mysql_port,
            user: self.mysql_user.clone(),
            password: self.mysql_password.clone(),
        }
    }

    #[must_use]
    pub fn tenant_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.tenant_connect_timeout_secs)
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Outcome of the development `.env` lookup, reported once logging is up.
#[derive(Debug)]
pub enum DevEnv {
    /// `GO_ENV` is not `dev`.
    Skipped,
    Loaded(PathBuf),
    Missing(String),
}

/// Loads `.env` into the process environment when `GO_ENV=dev`.
///
/// Must run before [`Cli::parse`] so the loaded values act as env fallbacks.
#[must_use]
pub fn load_dev_env() -> DevEnv {
    if std::env::var("GO_ENV").as_deref() != Ok("dev") {
        return DevEnv::Skipped;
    }
    match dotenvy::dotenv() {
        Ok(path) => DevEnv::Loaded(path),
        Err(e) => DevEnv::Missing(e.to_string()),
    }
}

impl DevEnv {
    pub fn report(&self) {
        match self {
            Self::Skipped => {}
            Self::Loaded(path) => info!(path = %path.display(), "loaded development environment"),
            Self::Missing(e) => warn!(error = %e, "GO_ENV=dev but no .env file was loaded"),
        }
    }
}

/// Installs the global subscriber. Logs always go to stderr so stdout stays
/// free for the stdio transport.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
