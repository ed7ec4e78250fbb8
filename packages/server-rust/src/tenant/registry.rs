//! Per-tenant connection pool cache.
//!
//! Each `robot_code` owns its own MySQL database. [`TenantConnectionRegistry`]
//! opens one pool per tenant on first use, validates it, and hands the same
//! pool to every later request for that tenant.
//!
//! Lookups take a shared read lock on the cache. A miss falls through to a
//! per-tenant async mutex, so a slow or unreachable tenant database never
//! blocks cold starts of other tenants. The cache is re-checked under that
//! mutex; only the first caller constructs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use super::config::{MysqlSettings, PoolPolicy};
use super::context::TenantDatabase;

/// Errors raised while acquiring a tenant pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantError {
    #[error("tenant key must not be empty")]
    InvalidTenantKey,
    #[error("database for tenant {tenant_key} is unavailable: {cause}")]
    TenantDatabaseUnavailable { tenant_key: String, cause: String },
}

// ---------------------------------------------------------------------------
// PoolConnector
// ---------------------------------------------------------------------------

/// Opens and validates the pool for one tenant.
///
/// Returning `Ok` means the pool answered a round trip. The registry never
/// calls this twice concurrently for the same key.
#[async_trait]
pub trait PoolConnector: Send + Sync {
    async fn connect(&self, tenant_key: &str) -> anyhow::Result<MySqlPool>;
}

/// Production connector: shared credentials, database = tenant key.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    settings: MysqlSettings,
    policy: PoolPolicy,
}

impl MySqlConnector {
    #[must_use]
    pub fn new(settings: MysqlSettings, policy: PoolPolicy) -> Self {
        Self { settings, policy }
    }
}

#[async_trait]
impl PoolConnector for MySqlConnector {
    async fn connect(&self, tenant_key: &str) -> anyhow::Result<MySqlPool> {
        let pool = self
            .policy
            .pool_options()
            .connect_with(self.settings.connect_options(tenant_key))
            .await?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(e.into());
        }
        Ok(pool)
    }
}

// ---------------------------------------------------------------------------
// TenantPool
// ---------------------------------------------------------------------------

/// A validated pool bound to exactly one tenant.
#[derive(Debug)]
pub struct TenantPool {
    tenant_key: String,
    pool: MySqlPool,
}

/// Shared handle to a cached tenant pool.
pub type PooledSource = Arc<TenantPool>;

impl TenantPool {
    #[must_use]
    pub fn new(tenant_key: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            tenant_key: tenant_key.into(),
            pool,
        }
    }

    #[must_use]
    pub fn tenant_key(&self) -> &str {
        &self.tenant_key
    }

    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Handle installed into the request context.
    #[must_use]
    pub fn database(&self) -> TenantDatabase {
        TenantDatabase::new(self.tenant_key.clone(), self.pool.clone())
    }
}

// ---------------------------------------------------------------------------
// TenantConnectionRegistry
// ---------------------------------------------------------------------------

/// Process-wide cache of tenant pools, created once at startup and shared.
pub struct TenantConnectionRegistry {
    connector: Arc<dyn PoolConnector>,
    pools: RwLock<HashMap<String, PooledSource>>,
    init_locks: DashMap<String, InitLock>,
    connect_timeout: Duration,
}

impl TenantConnectionRegistry {
    #[must_use]
    pub fn new(connector: Arc<dyn PoolConnector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            pools: RwLock::new(HashMap::new()),
            init_locks: DashMap::new(),
            connect_timeout,
        }
    }

    /// Returns the pool for `tenant_key`, creating and validating it on first use.
    ///
    /// Failed constructions are not remembered; the next caller tries again.
    ///
    /// # Errors
    ///
    /// - [`TenantError::InvalidTenantKey`] if `tenant_key` is empty.
    /// - [`TenantError::TenantDatabaseUnavailable`] if the pool could not be
    ///   opened or validated within the connect timeout.
    pub async fn acquire(&self, tenant_key: &str) -> Result<PooledSource, TenantError> {
        if tenant_key.is_empty() {
            return Err(TenantError::InvalidTenantKey);
        }

        if let Some(source) = self.get(tenant_key) {
            return Ok(source);
        }

        let lease = InitLease::take(&self.init_locks, tenant_key);
        let _guard = lease.lock.lock().await;

        // Another caller may have finished while we waited.
        if let Some(source) = self.get(tenant_key) {
            debug!(robot_code = tenant_key, "tenant pool created by concurrent caller");
            return Ok(source);
        }

        let pool = self.connect(tenant_key).await?;
        let source = Arc::new(TenantPool::new(tenant_key, pool));
        self.pools
            .write()
            .insert(tenant_key.to_string(), Arc::clone(&source));
        info!(robot_code = tenant_key, "tenant pool ready");
        Ok(source)
    }

    async fn connect(&self, tenant_key: &str) -> Result<MySqlPool, TenantError> {
        let attempt =
            tokio::time::timeout(self.connect_timeout, self.connector.connect(tenant_key)).await;
        match attempt {
            Ok(Ok(pool)) => Ok(pool),
            Ok(Err(e)) => {
                error!(robot_code = tenant_key, error = %e, "failed to open tenant database");
                Err(TenantError::TenantDatabaseUnavailable {
                    tenant_key: tenant_key.to_string(),
                    cause: e.to_string(),
                })
            }
            Err(_elapsed) => {
                error!(
                    robot_code = tenant_key,
                    timeout_secs = self.connect_timeout.as_secs(),
                    "timed out opening tenant database"
                );
                Err(TenantError::TenantDatabaseUnavailable {
                    tenant_key: tenant_key.to_string(),
                    cause: format!("connect timed out after {:?}", self.connect_timeout),
                })
            }
        }
    }

    /// Cached pool for `tenant_key`, without creating one.
    #[must_use]
    pub fn get(&self, tenant_key: &str) -> Option<PooledSource> {
        self.pools.read().get(tenant_key).cloned()
    }

    /// Keys of all cached tenants, sorted.
    #[must_use]
    pub fn cached_tenants(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pools.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Drops the cached pool for `tenant_key` and closes it.
    ///
    /// The next request for the tenant builds a fresh pool. Returns `false`
    /// when nothing was cached. Operators reach this through
    /// `DELETE /admin/tenants/{robot_code}`.
    pub async fn evict(&self, tenant_key: &str) -> bool {
        let removed = self.pools.write().remove(tenant_key);
        match removed {
            Some(source) => {
                source.pool().close().await;
                info!(robot_code = tenant_key, "tenant pool evicted");
                true
            }
            None => false,
        }
    }

    /// Closes every cached pool. Used during shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<PooledSource> = self.pools.write().drain().map(|(_, v)| v).collect();
        let count = drained.len();
        for source in drained {
            source.pool().close().await;
        }
        info!(count, "closed tenant pools");
    }
}

type InitLock = Arc<tokio::sync::Mutex<()>>;

/// A caller's share of a tenant's construction lock.
///
/// The map entry is removed when the last sharer goes away, whether the
/// construction succeeded, failed or was cancelled, so keys that never
/// resolve to a pool leave nothing behind.
struct InitLease<'a> {
    locks: &'a DashMap<String, InitLock>,
    key: &'a str,
    lock: InitLock,
}

impl<'a> InitLease<'a> {
    fn take(locks: &'a DashMap<String, InitLock>, key: &'a str) -> Self {
        let lock = Arc::clone(&*locks.entry(key.to_string()).or_default());
        Self { locks, key, lock }
    }
}

impl Drop for InitLease<'_> {
    fn drop(&mut self) {
        // One reference lives in the map, the other is ours.
        self.locks.remove_if(self.key, |_, lock| Arc::strong_count(lock) == 2);
    }
}

impl std::fmt::Debug for TenantConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnectionRegistry")
            .field("tenants", &self.cached_tenants())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
