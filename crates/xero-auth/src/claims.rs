//! JWT payload decoding
//!
//! Identity and access tokens are decoded for display only. Signatures are
//! not verified here: the tokens come straight from the token endpoint over
//! TLS, and Xero's API verifies them on every call.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Unpacked payload of an identity or access token.
///
/// Well-known claims are typed; everything else is kept in `extra` so the
/// full payload survives a serialize round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xero_userid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode the payload segment of a compact JWT (`header.payload.signature`).
pub fn decode(token: &str) -> Result<Claims> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next()) {
        (Some(_header), Some(payload), Some(_signature)) if !payload.is_empty() => payload,
        _ => return Err(Error::TokenDecode("not a compact JWT".into())),
    };

    // Some issuers pad their segments; URL_SAFE_NO_PAD rejects padding
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::TokenDecode(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::TokenDecode(format!("payload is not a JSON object: {e}")))
}
