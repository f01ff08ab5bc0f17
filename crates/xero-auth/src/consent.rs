//! Consent URL construction
//!
//! The consent URL sends the user to Xero's authorization endpoint. The
//! `state` parameter is an opaque per-session value that Xero echoes back on
//! the callback; [`crate::callback::CallbackParams`] checks it before any code
//! is exchanged.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use url::Url;

use crate::error::{Error, Result};

/// Generate a random `state` value for a consent request.
///
/// 32 random bytes encoded as URL-safe base64 without padding (43 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the consent URL with all required OAuth parameters.
///
/// Scopes are joined with spaces; the query is form-encoded by `url`.
pub fn build_consent_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<String> {
    let scope = scopes.join(" ");
    let url = Url::parse_with_params(
        authorize_endpoint,
        &[
            ("client_id", client_id),
            ("scope", scope.as_str()),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid authorize endpoint {authorize_endpoint}: {e}")))?;
    Ok(url.into())
}
