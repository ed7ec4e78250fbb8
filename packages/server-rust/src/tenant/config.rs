//! Connection settings shared by every tenant database.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

/// Static MySQL credentials. Only the database name varies per tenant.
#[derive(Clone)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for MysqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
        }
    }
}

impl MysqlSettings {
    /// Connect options targeting the database named after `tenant_key`.
    #[must_use]
    pub fn connect_options(&self, tenant_key: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(tenant_key)
            .charset("utf8mb4")
    }
}

/// Sizing and recycling policy applied to every tenant pool.
#[derive(Debug, Clone)]
pub struct PoolPolicy {
    /// Connections kept open while idle.
    pub base_size: u32,
    /// Extra connections allowed under load, on top of `base_size`.
    pub overflow: u32,
    /// Age after which a connection is closed and replaced, used or not.
    pub max_lifetime: Duration,
    /// Probe each connection before handing it out.
    pub pre_ping: bool,
    /// Longest wait for a free connection once the pool is exhausted.
    pub acquire_timeout: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            base_size: 10,
            overflow: 40,
            max_lifetime: Duration::from_secs(3600),
            pre_ping: true,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolPolicy {
    /// Upper bound on concurrent connections for one tenant.
    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.base_size + self.overflow
    }

    #[must_use]
    pub fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .min_connections(self.base_size)
            .max_connections(self.max_connections())
            .max_lifetime(self.max_lifetime)
            .test_before_acquire(self.pre_ping)
            .acquire_timeout(self.acquire_timeout)
    }
}
