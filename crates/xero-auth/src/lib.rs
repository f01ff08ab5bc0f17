//! Xero OAuth2 identity client
//!
//! Provides consent URL construction, authorization callback handling, token
//! exchange/refresh, JWT payload decoding and tenant connection management
//! for Xero's identity service. The crate holds no per-user state of its
//! own: callers keep the [`TokenSet`] and hand it back per request.
//!
//! Token flow:
//! 1. Caller generates a `state` via `consent::generate_state()` and sends the
//!    user to `XeroClient::build_consent_url()`
//! 2. Xero redirects back; `XeroClient::api_callback()` checks the state and
//!    exchanges the code for a `TokenSet`
//! 3. `TokenClient::update_tenants()` lists the authorised organisations
//! 4. `TokenClient::refresh_token()` or `XeroClient::refresh_with_fresh_client()`
//!    renew the tokens
//! 5. `TokenClient::disconnect()` revokes a tenant connection

pub mod callback;
pub mod claims;
pub mod client;
pub mod connections;
pub mod consent;
pub mod constants;
pub mod error;
pub mod token;

pub use callback::CallbackParams;
pub use claims::Claims;
pub use client::{ClientConfig, TokenClient, XeroClient, build_http_client};
pub use connections::{Organisation, Tenant};
pub use consent::generate_state;
pub use constants::*;
pub use error::{Error, Result};
pub use token::{TokenSet, unix_now};
