//! Xero identity client
//!
//! [`XeroClient`] is immutable after construction and safe to share across
//! requests: it holds the client credentials, the endpoints and a pooled
//! HTTP client. Anything tied to a user's tokens lives in a [`TokenClient`],
//! which a request builds from its own session's [`TokenSet`] and drops when
//! it is done. No token state is ever shared between requests.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tracing::{debug, info};

use crate::callback::CallbackParams;
use crate::connections::{self, Tenant};
use crate::constants::{Endpoints, ORGANISATION_TENANT_TYPE};
use crate::consent;
use crate::error::{Error, Result};
use crate::token::{self, TokenSet};

/// OAuth client registration and transport settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub endpoints: Endpoints,
    pub http_timeout: Duration,
}

/// Build an HTTP client with the same connect and request timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("building HTTP client: {e}")))
}

/// Shared, token-free Xero client.
#[derive(Debug, Clone)]
pub struct XeroClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl XeroClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.http_timeout)?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Pooled HTTP client, also used for Accounting API calls.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Consent URL carrying the given `state`.
    pub fn build_consent_url(&self, state: &str) -> Result<String> {
        consent::build_consent_url(
            &self.config.endpoints.authorize,
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scopes,
            state,
        )
    }

    /// Complete the authorization redirect: validate the callback query
    /// against `expected_state` and exchange the code.
    ///
    /// Authorization codes are single use, so replaying a callback fails
    /// with [`Error::InvalidGrant`].
    pub async fn api_callback(&self, callback: &str, expected_state: &str) -> Result<TokenClient> {
        let params = CallbackParams::parse(callback);
        let code = params.authorization_code(expected_state)?;

        let token_set = token::exchange_code(
            &self.http,
            &self.config.endpoints.token,
            &self.config.client_id,
            self.config.client_secret.expose(),
            code,
            &self.config.redirect_uri,
        )
        .await?;

        info!(expires_at = token_set.expires_at, "authorization code exchanged");
        Ok(self.with_token_set(token_set))
    }

    /// Per-request client bound to a session's tokens.
    pub fn with_token_set(&self, token_set: TokenSet) -> TokenClient {
        TokenClient {
            http: self.http.clone(),
            config: Arc::clone(&self.config),
            token_set,
            tenants: Vec::new(),
        }
    }

    /// Exchange a refresh token on a brand new HTTP client, using nothing
    /// but the client credentials and the refresh token itself.
    pub async fn refresh_with_fresh_client(&self, refresh_token: &str) -> Result<TokenSet> {
        let fresh = build_http_client(self.config.http_timeout)?;
        token::refresh_with_refresh_token(
            &fresh,
            &self.config.endpoints.token,
            &self.config.client_id,
            self.config.client_secret.expose(),
            refresh_token,
        )
        .await
    }
}

/// Client bound to one token set for the duration of a request.
#[derive(Debug)]
pub struct TokenClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    token_set: TokenSet,
    tenants: Vec<Tenant>,
}

impl TokenClient {
    pub fn read_token_set(&self) -> &TokenSet {
        &self.token_set
    }

    /// Tenants loaded by the last [`TokenClient::update_tenants`] call.
    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    pub fn into_parts(self) -> (TokenSet, Vec<Tenant>) {
        (self.token_set, self.tenants)
    }

    /// Reload the tenant list from the connections endpoint.
    ///
    /// With `full_org_details`, every organisation tenant is also enriched
    /// with its `Organisation` record (one extra call per tenant).
    pub async fn update_tenants(&mut self, full_org_details: bool) -> Result<&[Tenant]> {
        let mut tenants = connections::list_connections(
            &self.http,
            &self.config.endpoints.connections,
            &self.token_set.access_token,
        )
        .await?;

        if full_org_details {
            for tenant in tenants
                .iter_mut()
                .filter(|t| t.tenant_type == ORGANISATION_TENANT_TYPE)
            {
                tenant.org_data = connections::fetch_organisation(
                    &self.http,
                    &self.config.endpoints.accounting,
                    &self.token_set.access_token,
                    &tenant.tenant_id,
                )
                .await?;
            }
        }

        debug!(tenants = tenants.len(), full_org_details, "tenants updated");
        self.tenants = tenants;
        Ok(&self.tenants)
    }

    /// Refresh using the bound token set's refresh token, replacing it.
    pub async fn refresh_token(&mut self) -> Result<&TokenSet> {
        let refresh = self.token_set.refresh_token.as_deref().ok_or_else(|| {
            Error::InvalidGrant("token set has no refresh token (offline_access scope missing?)".into())
        })?;

        let refreshed = token::refresh_with_refresh_token(
            &self.http,
            &self.config.endpoints.token,
            &self.config.client_id,
            self.config.client_secret.expose(),
            refresh,
        )
        .await?;

        self.token_set = refreshed;
        Ok(&self.token_set)
    }

    /// Revoke one tenant connection. The token set itself stays valid for
    /// any remaining tenants and is returned unchanged.
    pub async fn disconnect(&mut self, connection_id: &str) -> Result<&TokenSet> {
        connections::delete_connection(
            &self.http,
            &self.config.endpoints.connections,
            &self.token_set.access_token,
            connection_id,
        )
        .await?;
        info!(connection_id, "tenant connection revoked");
        Ok(&self.token_set)
    }
}
