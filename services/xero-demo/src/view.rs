//! Authentication view returned with every `/xero` response

use chrono::DateTime;
use serde::Serialize;
use xero_auth::{Claims, Tenant, TokenSet};

use crate::session::SessionData;

/// Snapshot of a session's authentication state, shaped for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationView {
    pub decoded_id_token: Option<Claims>,
    pub token_set: Option<TokenSet>,
    pub decoded_access_token: Option<Claims>,
    /// Access token `exp` as a readable UTC time, empty when unknown
    pub access_token_expires: String,
    pub all_tenants: Vec<Tenant>,
    pub active_tenant: Option<Tenant>,
}

impl AuthenticationView {
    pub fn from_session(session: &SessionData) -> Self {
        let exp = session.decoded_access_token.as_ref().and_then(|c| c.exp);
        Self {
            decoded_id_token: session.decoded_id_token.clone(),
            token_set: session.token_set.clone(),
            decoded_access_token: session.decoded_access_token.clone(),
            access_token_expires: readable_expiry(exp),
            all_tenants: session.tenants().to_vec(),
            active_tenant: session.active_tenant().cloned(),
        }
    }
}

/// Format a unix timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn readable_expiry(exp: Option<i64>) -> String {
    exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_projects_empty_view() {
        let view = AuthenticationView::from_session(&SessionData::default());
        assert!(view.token_set.is_none());
        assert!(view.active_tenant.is_none());
        assert!(view.all_tenants.is_empty());
        assert_eq!(view.access_token_expires, "");

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["decodedIdToken"].is_null());
        assert!(json["tokenSet"].is_null());
        assert_eq!(json["allTenants"], serde_json::json!([]));
        assert_eq!(json["accessTokenExpires"], "");
    }

    #[test]
    fn expiry_comes_from_access_token_claims() {
        let mut session = SessionData::default();
        session.decoded_access_token = Some(Claims {
            exp: Some(1_700_000_000),
            ..Default::default()
        });
        let view = AuthenticationView::from_session(&session);
        assert_eq!(view.access_token_expires, "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn active_tenant_is_projected_from_session() {
        let mut session = SessionData::default();
        session.reset_tenants(vec![Tenant {
            id: "c1".into(),
            tenant_id: "t1".into(),
            ..Default::default()
        }]);
        let json = serde_json::to_value(AuthenticationView::from_session(&session)).unwrap();
        assert_eq!(json["activeTenant"]["tenantId"], "t1");
        assert_eq!(json["allTenants"][0]["id"], "c1");
    }
}
