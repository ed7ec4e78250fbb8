//! Multi-tenant database routing.
//!
//! 1. **Registry** (`registry`): one validated MySQL pool per `robot_code`
//! 2. **Context** (`context`): flow-local identity and database bindings
//! 3. **Resolver** (`resolver`): metadata -> identity -> pool -> bindings

pub mod config;
pub mod context;
pub mod registry;
pub mod resolver;

pub use config::{MysqlSettings, PoolPolicy};
pub use context::{
    get_current_tenant_identity, get_tenant_scoped_database, ContextError, FlowBindings,
    RequestContext, TenantDatabase,
};
pub use registry::{
    MySqlConnector, PoolConnector, PooledSource, TenantConnectionRegistry, TenantError, TenantPool,
};
pub use resolver::{Resolution, TenantResolver};
