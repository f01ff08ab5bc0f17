//! Xero identity and API endpoints
//!
//! Production endpoints used when the service configuration does not
//! override them. Tests point [`Endpoints`] at an in-process mock instead.

use std::time::Duration;

/// Authorization endpoint the user is redirected to for consent
pub const AUTHORIZE_ENDPOINT: &str = "https://login.xero.com/identity/connect/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://identity.xero.com/connect/token";

/// Lists (GET) and revokes (DELETE /{id}) tenant connections
pub const CONNECTIONS_ENDPOINT: &str = "https://api.xero.com/connections";

/// Accounting API root, used here only for organisation lookups
pub const ACCOUNTING_API_BASE: &str = "https://api.xero.com/api.xro/2.0";

/// Connect and request timeout applied to every identity/API call
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(3000);

/// Tenant type reported by the connections endpoint for organisations
pub const ORGANISATION_TENANT_TYPE: &str = "ORGANISATION";

/// Set of URLs the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub connections: String,
    pub accounting: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZE_ENDPOINT.to_string(),
            token: TOKEN_ENDPOINT.to_string(),
            connections: CONNECTIONS_ENDPOINT.to_string(),
            accounting: ACCOUNTING_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints rooted at a single base URL, laid out like the production
    /// hosts (`/identity/connect/authorize`, `/connect/token`, `/connections`,
    /// `/api.xro/2.0`). Used for mock servers.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{base}/identity/connect/authorize"),
            token: format!("{base}/connect/token"),
            connections: format!("{base}/connections"),
            accounting: format!("{base}/api.xro/2.0"),
        }
    }
}
