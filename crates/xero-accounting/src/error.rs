//! Error types for Accounting API calls

/// Errors from Accounting API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Non-2xx response. `body` is the raw platform error payload.
    #[error("{operation} returned {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The call succeeded but returned nothing to continue with
    /// (e.g. no contacts, no paid invoices).
    #[error("{0}")]
    Empty(String),
}

impl Error {
    /// HTTP status reported by the platform, if the call got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for Accounting API operations.
pub type Result<T> = std::result::Result<T, Error>;
