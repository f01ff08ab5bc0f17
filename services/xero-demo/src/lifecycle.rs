//! Token lifecycle
//!
//! Rules for obtaining, refreshing and dropping a session's tokens. Every
//! operation works on a per-request [`TokenClient`](xero_auth::TokenClient) built from the session's
//! own [`TokenSet`], and writes to the session only once every remote call
//! has succeeded: a failed operation leaves the session as it was.

use tracing::{debug, error, info, warn};
use xero_auth::{Claims, TokenSet, XeroClient, claims, generate_state};

use crate::error::ApiError;
use crate::session::SessionData;
use crate::view::readable_expiry;

pub struct TokenLifecycle {
    client: XeroClient,
    full_org_details: bool,
}

impl TokenLifecycle {
    pub fn new(client: XeroClient, full_org_details: bool) -> Self {
        Self {
            client,
            full_org_details,
        }
    }

    pub fn client(&self) -> &XeroClient {
        &self.client
    }

    /// Consent URL for this session. The `state` is generated on first use
    /// and kept, so the URL stays stable until the session expires.
    pub fn consent_url(&self, session: &mut SessionData) -> String {
        let state = session
            .oauth_state
            .get_or_insert_with(generate_state)
            .clone();
        self.client.build_consent_url(&state).unwrap_or_else(|e| {
            error!(error = %e, "building consent URL failed");
            String::new()
        })
    }

    /// Re-synchronise the tenant list of an authenticated session. Never
    /// fails: when the refresh does not go through, the stored view stands.
    pub async fn initiate_auth(&self, session: &mut SessionData) {
        let Some(token_set) = session.token_set.clone() else {
            return;
        };

        let mut client = self.client.with_token_set(token_set);
        let refreshed = client
            .update_tenants(self.full_org_details)
            .await
            .map(|tenants| tenants.len());
        match refreshed {
            Ok(count) => {
                debug!(tenants = count, "tenant list re-synchronised");
                let (_, tenants) = client.into_parts();
                session.sync_tenants(tenants);
            }
            Err(e) => warn!(error = %e, "tenant refresh failed, returning stored view"),
        }
    }

    /// Finish the authorization redirect: check the callback against the
    /// session's `state`, exchange the code, load tenants and store it all
    /// with the first tenant active.
    pub async fn complete_callback(
        &self,
        session: &mut SessionData,
        callback_url: &str,
    ) -> Result<(), ApiError> {
        let expected_state = session.oauth_state.as_deref().ok_or_else(|| {
            ApiError::CallbackExchangeFailed(xero_auth::Error::Callback(
                "no consent request is pending for this session".into(),
            ))
        })?;

        let mut client = self
            .client
            .api_callback(callback_url, expected_state)
            .await
            .map_err(ApiError::CallbackExchangeFailed)?;
        client
            .update_tenants(self.full_org_details)
            .await
            .map_err(ApiError::CallbackExchangeFailed)?;

        let (token_set, tenants) = client.into_parts();
        let (id_claims, access_claims) =
            decode_token_set(&token_set).map_err(ApiError::CallbackExchangeFailed)?;

        info!(
            tenants = tenants.len(),
            sub = id_claims.as_ref().and_then(|c| c.sub.as_deref()).unwrap_or_default(),
            "session authenticated"
        );
        session.set_tokens(token_set, id_claims, access_claims);
        session.reset_tenants(tenants);
        Ok(())
    }

    /// Renew the session's tokens.
    ///
    /// The refresh runs twice: once through the session-bound client and once
    /// on a freshly built client holding only the client credentials and the
    /// stored refresh token. The second result is the one stored.
    pub async fn refresh_token(&self, session: &mut SessionData) -> Result<(), ApiError> {
        let token_set = session
            .token_set
            .clone()
            .ok_or(ApiError::NotAuthenticated)?;
        log_expiry(&token_set);

        let refresh = token_set.refresh_token.clone().ok_or_else(|| {
            ApiError::RefreshFailed(xero_auth::Error::InvalidGrant(
                "session token set has no refresh token".into(),
            ))
        })?;

        let mut live = self.client.with_token_set(token_set);
        let live_expires_at = live
            .refresh_token()
            .await
            .map_err(ApiError::RefreshFailed)?
            .expires_at;
        debug!(expires_at = live_expires_at, "session-bound refresh succeeded");

        let fresh = self
            .client
            .refresh_with_fresh_client(&refresh)
            .await
            .map_err(ApiError::RefreshFailed)?;
        let (id_claims, access_claims) =
            decode_token_set(&fresh).map_err(ApiError::RefreshFailed)?;

        info!(expires_at = fresh.expires_at, "token set refreshed");
        let tenants = session.tenants().to_vec();
        session.set_tokens(fresh, id_claims, access_claims);
        session.reset_tenants(tenants);
        Ok(())
    }

    /// Revoke the active tenant's connection. With tenants left the session
    /// moves to the first of them; otherwise it drops its tokens entirely.
    pub async fn disconnect(&self, session: &mut SessionData) -> Result<(), ApiError> {
        let token_set = session
            .token_set
            .clone()
            .ok_or(ApiError::NotAuthenticated)?;
        let connection_id = session
            .active_tenant()
            .map(|t| t.id.clone())
            .ok_or(ApiError::NotAuthenticated)?;

        let mut client = self.client.with_token_set(token_set);
        client
            .disconnect(&connection_id)
            .await
            .map_err(ApiError::DisconnectFailed)?;
        client
            .update_tenants(self.full_org_details)
            .await
            .map_err(ApiError::DisconnectFailed)?;

        let (token_set, tenants) = client.into_parts();
        if tenants.is_empty() {
            info!(connection_id = %connection_id, "last tenant disconnected, session cleared");
            session.clear_authentication();
            return Ok(());
        }

        let (id_claims, access_claims) =
            decode_token_set(&token_set).map_err(ApiError::DisconnectFailed)?;
        info!(connection_id = %connection_id, remaining = tenants.len(), "tenant disconnected");
        session.set_tokens(token_set, id_claims, access_claims);
        session.reset_tenants(tenants);
        Ok(())
    }
}

/// Decode the identity token (when issued) and the access token.
fn decode_token_set(token_set: &TokenSet) -> xero_auth::Result<(Option<Claims>, Claims)> {
    let id_claims = token_set.id_token.as_deref().map(claims::decode).transpose()?;
    let access_claims = claims::decode(&token_set.access_token)?;
    Ok((id_claims, access_claims))
}

fn log_expiry(token_set: &TokenSet) {
    let now = xero_auth::unix_now();
    let expired = token_set.is_expired_at(now);
    info!(
        expires_in = token_set.expires_in_at(now),
        expires_at = token_set.expires_at,
        readable = %readable_expiry(Some(token_set.expires_at)),
        expired,
        "refreshing token set"
    );
}
