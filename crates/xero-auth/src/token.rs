//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (callback completion)
//! 2. Token refresh
//!
//! Both POST a form to the token endpoint with HTTP Basic client
//! authentication (`client_id:client_secret`).

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Raw response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Tokens issued for one authorization, with an absolute expiry.
///
/// A `TokenSet` is never edited in place: a refresh yields a new one that
/// replaces the old wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration as unix timestamp in seconds
    pub expires_at: i64,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Convert a token endpoint response received at `now` (unix seconds).
    pub fn from_response(response: TokenResponse, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: now + response.expires_in,
            token_type: response.token_type,
            scope: response.scope,
        }
    }

    /// Seconds until expiry relative to `now`; negative once expired.
    pub fn expires_in_at(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    pub fn expires_in(&self) -> i64 {
        self.expires_in_at(unix_now())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Exchange an authorization code for a token set (callback completion).
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenSet> {
    request_token(
        client,
        token_endpoint,
        client_id,
        client_secret,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ],
        "token exchange",
    )
    .await
}

/// Exchange a refresh token for a new token set.
///
/// Needs nothing but the client credentials and the refresh token, so it
/// works from a freshly constructed HTTP client with no prior session state.
pub async fn refresh_with_refresh_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenSet> {
    request_token(
        client,
        token_endpoint,
        client_id,
        client_secret,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ],
        "token refresh",
    )
    .await
}

async fn request_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: &str,
    form: &[(&str, &str)],
    operation: &str,
) -> Result<TokenSet> {
    let response = client
        .post(token_endpoint)
        .basic_auth(client_id, Some(client_secret))
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("{operation} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 400 invalid_grant / 401 invalid_client: the grant itself is unusable
        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(Error::InvalidGrant(format!(
                "{operation} rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "{operation} returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid {operation} response: {e}")))?;

    let token_set = TokenSet::from_response(token, unix_now());
    debug!(expires_at = token_set.expires_at, "{operation} succeeded");
    Ok(token_set)
}
