//! Tenant resolution at the start of every flow.

use std::sync::Arc;

use robot_mcp_core::{Metadata, TenantIdentity};
use tracing::{debug, error, warn};

use super::context::RequestContext;
use super::registry::TenantConnectionRegistry;

/// What [`TenantResolver::apply`] installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No metadata, or no flow to install into. Nothing bound.
    Skipped,
    /// Identity bound; it carried no robot code so no database was looked up.
    IdentityOnly,
    /// Identity and database bound.
    Bound { robot_code: String },
    /// Identity bound; the tenant database could not be acquired.
    DatabaseUnavailable { robot_code: String },
}

/// Turns request metadata into flow bindings.
///
/// Never fails: malformed metadata degrades to defaulted fields and an
/// unreachable database leaves the flow without a database binding. Handlers
/// check the bindings themselves.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    registry: Arc<TenantConnectionRegistry>,
}

impl TenantResolver {
    #[must_use]
    pub fn new(registry: Arc<TenantConnectionRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TenantConnectionRegistry> {
        &self.registry
    }

    /// Installs identity, then database, into the current flow.
    pub async fn apply(&self, meta: Option<&Metadata>) -> Resolution {
        let Some(meta) = meta.filter(|m| !m.is_empty()) else {
            debug!("request carries no tenant metadata");
            return Resolution::Skipped;
        };

        let parsed = TenantIdentity::from_metadata(meta);
        if parsed.is_degraded() {
            warn!(
                fields = ?parsed.malformed_fields,
                "tenant metadata had malformed fields, defaulted"
            );
        }
        let identity = parsed.identity;
        let routable = identity.has_robot_code();
        let robot_code = identity.robot_code.clone();

        if let Err(e) = RequestContext::set_identity(identity) {
            warn!(error = %e, "tenant resolution outside a request flow");
            return Resolution::Skipped;
        }

        if !routable {
            return Resolution::IdentityOnly;
        }

        match self.registry.acquire(&robot_code).await {
            Ok(source) => {
                if let Err(e) = RequestContext::set_database(source.database()) {
                    warn!(robot_code = %robot_code, error = %e, "could not bind tenant database");
                    return Resolution::DatabaseUnavailable { robot_code };
                }
                Resolution::Bound { robot_code }
            }
            Err(e) => {
                error!(robot_code = %robot_code, error = %e, "tenant database unavailable");
                Resolution::DatabaseUnavailable { robot_code }
            }
        }
    }
}
