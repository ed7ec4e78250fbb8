//! Flow-local tenant bindings.
//!
//! Every inbound tool call or webhook delivery runs inside its own flow,
//! opened with [`RequestContext::scope`]. The tenant identity and database
//! handle set during that flow are visible to everything it awaits, and to
//! nothing else: two flows interleaved on the same worker thread each see
//! only their own bindings. Leaving the scope drops the bindings; the
//! underlying pool stays cached in the registry.
//!
//! Spawned tasks do not inherit the flow. Hand bindings over explicitly with
//! [`RequestContext::snapshot`] and [`RequestContext::scope_with`].

use std::cell::RefCell;
use std::future::Future;

use robot_mcp_core::TenantIdentity;
use sqlx::MySqlPool;

tokio::task_local! {
    static FLOW: RefCell<FlowBindings>;
}

/// Errors from reading or writing flow bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("no tenant identity is bound to this request")]
    NoTenantIdentity,
    #[error("no tenant database is bound to this request")]
    NoTenantDatabaseBound,
    #[error("not running inside a request flow")]
    NoActiveFlow,
}

/// Database handle for the current tenant.
///
/// Wraps the tenant's pool. Repositories check a connection out per query and
/// return it when the query completes, so nothing is held across requests.
#[derive(Debug, Clone)]
pub struct TenantDatabase {
    robot_code: String,
    pool: MySqlPool,
}

impl TenantDatabase {
    #[must_use]
    pub fn new(robot_code: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            robot_code: robot_code.into(),
            pool,
        }
    }

    #[must_use]
    pub fn robot_code(&self) -> &str {
        &self.robot_code
    }

    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// Everything bound to one flow.
#[derive(Debug, Clone, Default)]
pub struct FlowBindings {
    pub identity: Option<TenantIdentity>,
    pub database: Option<TenantDatabase>,
}

/// Accessors for the current flow's bindings.
pub struct RequestContext;

impl RequestContext {
    /// Runs `fut` inside a fresh, empty flow.
    pub fn scope<F: Future>(fut: F) -> impl Future<Output = F::Output> {
        Self::scope_with(FlowBindings::default(), fut)
    }

    /// Runs `fut` inside a flow pre-populated with `bindings`.
    pub fn scope_with<F: Future>(
        bindings: FlowBindings,
        fut: F,
    ) -> impl Future<Output = F::Output> {
        FLOW.scope(RefCell::new(bindings), fut)
    }

    /// True when called from inside a flow.
    #[must_use]
    pub fn is_active() -> bool {
        FLOW.try_with(|_| ()).is_ok()
    }

    /// Copy of the current bindings, for handing to a spawned task.
    #[must_use]
    pub fn snapshot() -> Option<FlowBindings> {
        FLOW.try_with(|cell| cell.borrow().clone()).ok()
    }

    /// # Errors
    ///
    /// Returns [`ContextError::NoActiveFlow`] outside a flow.
    pub fn set_identity(identity: TenantIdentity) -> Result<(), ContextError> {
        FLOW.try_with(|cell| cell.borrow_mut().identity = Some(identity))
            .map_err(|_| ContextError::NoActiveFlow)
    }

    #[must_use]
    pub fn get_identity() -> Option<TenantIdentity> {
        FLOW.try_with(|cell| cell.borrow().identity.clone())
            .ok()
            .flatten()
    }

    /// # Errors
    ///
    /// Returns [`ContextError::NoActiveFlow`] outside a flow.
    pub fn set_database(database: TenantDatabase) -> Result<(), ContextError> {
        FLOW.try_with(|cell| cell.borrow_mut().database = Some(database))
            .map_err(|_| ContextError::NoActiveFlow)
    }

    #[must_use]
    pub fn get_database() -> Option<TenantDatabase> {
        FLOW.try_with(|cell| cell.borrow().database.clone())
            .ok()
            .flatten()
    }
}

/// Identity of the tenant the current flow belongs to, if resolved.
#[must_use]
pub fn get_current_tenant_identity() -> Option<TenantIdentity> {
    RequestContext::get_identity()
}

/// Database bound to the current flow.
///
/// # Errors
///
/// Returns [`ContextError::NoTenantDatabaseBound`] when none was installed.
pub fn get_tenant_scoped_database() -> Result<TenantDatabase, ContextError> {
    RequestContext::get_database().ok_or(ContextError::NoTenantDatabaseBound)
}
