//! Accounting API demo pipelines
//!
//! Each pipeline is a fixed, sequential run of Accounting API calls against
//! the session's active tenant. Per-item validation errors reported by the
//! platform are logged and the run continues; any rejected call aborts it.

pub mod attachment;
pub mod invoices;
pub mod purchase_orders;
pub mod quotes;

use tracing::warn;
use xero_accounting::{AccountingApi, Validated};
use xero_auth::{Tenant, XeroClient};

use crate::error::ApiError;
use crate::session::SessionData;

/// What every pipeline needs: a token set and an active tenant.
pub struct TenantContext {
    pub api: AccountingApi,
    pub tenant: Tenant,
    /// Email claim of the signed-in user's identity token
    pub email: Option<String>,
}

impl TenantContext {
    pub fn from_session(session: &SessionData, client: &XeroClient) -> Result<Self, ApiError> {
        let (Some(token_set), Some(tenant)) = (&session.token_set, session.active_tenant()) else {
            return Err(ApiError::NotAuthenticated);
        };

        let api = AccountingApi::new(
            client.http().clone(),
            &client.config().endpoints.accounting,
            &token_set.access_token,
            tenant.tenant_id.clone(),
        )?;
        Ok(Self {
            api,
            tenant: tenant.clone(),
            email: session
                .decoded_id_token
                .as_ref()
                .and_then(|c| c.email.clone()),
        })
    }
}

/// Log every validation message the platform attached to `items`.
pub fn log_validation_errors<T: Validated>(operation: &str, items: &[T]) {
    for (index, item) in items.iter().enumerate().filter(|(_, i)| i.has_errors()) {
        for message in item.validation_messages() {
            warn!(operation, index, message, "validation error");
        }
    }
}

/// Id of the first contact in the organisation.
pub async fn first_contact_id(api: &AccountingApi) -> Result<String, ApiError> {
    let contacts = api.get_contacts().await?;
    contacts
        .into_iter()
        .find_map(|c| c.contact_id)
        .ok_or_else(|| xero_accounting::Error::Empty("organisation has no contacts".into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connection, xero_client};
    use xero_auth::Claims;

    #[test]
    fn context_requires_token_set_and_active_tenant() {
        let client = xero_client("http://127.0.0.1:9");

        let empty = SessionData::default();
        assert!(matches!(
            TenantContext::from_session(&empty, &client),
            Err(ApiError::NotAuthenticated)
        ));

        let mut no_tokens = SessionData::default();
        no_tokens.reset_tenants(vec![serde_json::from_value(connection("c1", "t1")).unwrap()]);
        assert!(matches!(
            TenantContext::from_session(&no_tokens, &client),
            Err(ApiError::NotAuthenticated)
        ));
    }

    #[test]
    fn context_scopes_api_to_active_tenant() {
        let client = xero_client("http://127.0.0.1:9");
        let mut session = SessionData::default();
        session.set_tokens(
            crate::test_support::token_set("at"),
            Some(Claims {
                email: Some("rick@example.com".into()),
                ..Default::default()
            }),
            Claims::default(),
        );
        session.reset_tenants(vec![
            serde_json::from_value(connection("c1", "t1")).unwrap(),
            serde_json::from_value(connection("c2", "t2")).unwrap(),
        ]);

        let ctx = TenantContext::from_session(&session, &client).unwrap();
        assert_eq!(ctx.api.tenant_id(), "t1");
        assert_eq!(ctx.tenant.id, "c1");
        assert_eq!(ctx.email.as_deref(), Some("rick@example.com"));
    }
}
