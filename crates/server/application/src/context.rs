//! Per-request context threaded into the services for auditing.

use campo_server_domain::auth::SessionUser;

/// The acting user plus the client metadata the audit trail stores.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: SessionUser,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(user: SessionUser) -> Self {
        Self {
            user,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_client(
        user: SessionUser,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user,
            ip_address,
            user_agent,
        }
    }
}
