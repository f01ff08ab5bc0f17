//! Service error types
//!
//! Every `/xero` handler converts its failure into an [`ApiError`] at the
//! boundary. The error kind picks the HTTP status and the `error.type` field
//! of the response envelope.

use axum::http::StatusCode;
use thiserror::Error;

/// Session store failure
#[derive(Error, Debug)]
#[error("session store failure: {0}")]
pub struct SessionError(pub String);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not authenticated: connect a Xero organisation first")]
    NotAuthenticated,

    #[error("authorization callback failed: {0}")]
    CallbackExchangeFailed(xero_auth::Error),

    #[error("token refresh failed: {0}")]
    RefreshFailed(xero_auth::Error),

    #[error("disconnect failed: {0}")]
    DisconnectFailed(xero_auth::Error),

    #[error("accounting API call failed: {0}")]
    RemoteCallFailed(#[from] xero_accounting::Error),

    #[error("attachment unavailable: {0}")]
    Attachment(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("encoding response failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated | Self::CallbackExchangeFailed(_) | Self::RefreshFailed(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::DisconnectFailed(_) | Self::RemoteCallFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Attachment(_) | Self::Session(_) | Self::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable identifier used as `error.type` in responses and as the
    /// `kind` label of the upstream error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::CallbackExchangeFailed(_) => "callback_exchange_failed",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::DisconnectFailed(_) => "disconnect_failed",
            Self::RemoteCallFailed(_) => "remote_call_failed",
            Self::Attachment(_) => "attachment_error",
            Self::Session(_) => "session_error",
            Self::Encode(_) => "encode_error",
        }
    }

    /// Whether the failure came from a call to Xero.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::CallbackExchangeFailed(_)
                | Self::RefreshFailed(_)
                | Self::DisconnectFailed(_)
                | Self::RemoteCallFailed(_)
        )
    }
}
