//! Error types for Xero identity operations

/// Errors from OAuth and connection operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The token endpoint rejected the grant (used/expired code, revoked
    /// refresh token, bad client credentials).
    #[error("grant rejected: {0}")]
    InvalidGrant(String),

    #[error("authorization callback rejected: {0}")]
    Callback(String),

    #[error("state mismatch: callback state does not match the consent request")]
    StateMismatch,

    #[error("token decode failed: {0}")]
    TokenDecode(String),

    #[error("connections request failed: {0}")]
    Connections(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Result alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;
