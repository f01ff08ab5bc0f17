//! `/xero` HTTP surface
//!
//! Every route runs the same envelope: load (or start) the browser session,
//! run one operation against it, attach a fresh consent URL, store the session
//! if the operation changed it and answer with JSON. Success bodies carry the authentication view plus
//! the operation's fields; failures carry `error.type` and `error.message`
//! with the status picked by [`ApiError::status`].

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{MethodRouter, get};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::{record_request, record_upstream_error};
use crate::pipelines::{self, TenantContext};
use crate::session::{SessionData, build_session_cookie, new_session_id, session_id_from_headers};
use crate::view::AuthenticationView;

/// Session cookie and pipeline settings shared by all `/xero` routes.
#[derive(Debug, Clone)]
pub struct RouteSettings {
    pub cookie_name: String,
    pub session_ttl: Duration,
    pub secure_cookie: bool,
    pub attachment_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    InitiateAuth,
    CompleteCallback,
    RefreshToken,
    Disconnect,
    Invoices,
    AttachmentInvoice,
    PurchaseOrders,
    Quotes,
}

impl Operation {
    /// Route label for logs and metrics.
    fn route(self) -> &'static str {
        match self {
            Self::InitiateAuth => "/xero/",
            Self::CompleteCallback => "/xero/callback",
            Self::RefreshToken => "/xero/refresh-token",
            Self::Disconnect => "/xero/disconnect",
            Self::Invoices => "/xero/invoices",
            Self::AttachmentInvoice => "/xero/attachment-invoice",
            Self::PurchaseOrders => "/xero/purchaseorders",
            Self::Quotes => "/xero/quotes",
        }
    }
}

type Fields = Map<String, Value>;

/// All `/xero` routes, registered with their full paths.
pub fn xero_routes() -> Router<AppState> {
    Router::new()
        .route("/xero", operation(Operation::InitiateAuth))
        .route("/xero/", operation(Operation::InitiateAuth))
        .route("/xero/callback", operation(Operation::CompleteCallback))
        .route("/xero/refresh-token", operation(Operation::RefreshToken))
        .route("/xero/disconnect", operation(Operation::Disconnect))
        .route("/xero/invoices", operation(Operation::Invoices))
        .route("/xero/attachment-invoice", operation(Operation::AttachmentInvoice))
        .route("/xero/purchaseorders", operation(Operation::PurchaseOrders))
        .route("/xero/quotes", operation(Operation::Quotes))
}

fn operation(op: Operation) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, headers: HeaderMap, uri: Uri| async move {
            dispatch(&state, op, &headers, &uri).await
        },
    )
}

async fn dispatch(state: &AppState, op: Operation, headers: &HeaderMap, uri: &Uri) -> Response {
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    let settings = &state.settings;

    let (session_id, loaded) = load_session(state, headers).await;
    let (status, body) = match loaded {
        Ok(loaded) => {
            let mut session = loaded.clone();
            let result = execute(state, op, &mut session, uri).await;
            let consent_url = state.lifecycle.consent_url(&mut session);

            // Writing back an unchanged copy would undo a concurrent refresh.
            let stored = if session == loaded {
                state.sessions.touch(&session_id).await
            } else {
                state.sessions.save(&session_id, session.clone()).await
            };
            let result = match stored {
                Ok(()) => result,
                Err(e) => Err(e.into()),
            };
            match result.and_then(|fields| success_body(&consent_url, &session, fields)) {
                Ok(body) => (StatusCode::OK, body),
                Err(err) => (err.status(), failure_body(state, op, &consent_url, &err)),
            }
        }
        Err(err) => {
            let consent_url = state.lifecycle.consent_url(&mut SessionData::default());
            (err.status(), failure_body(state, op, &consent_url, &err))
        }
    };

    record_request(op.route(), status.as_u16(), started.elapsed().as_secs_f64());
    let cookie = build_session_cookie(
        &settings.cookie_name,
        &session_id,
        settings.session_ttl,
        settings.secure_cookie,
    );
    (status, [(SET_COOKIE, cookie)], Json(body)).into_response()
}

/// Session named by the request cookie, or a new empty one. Unknown or
/// expired ids are replaced rather than revived.
async fn load_session(
    state: &AppState,
    headers: &HeaderMap,
) -> (String, Result<SessionData, ApiError>) {
    let Some(id) = session_id_from_headers(headers, &state.settings.cookie_name) else {
        return (new_session_id(), Ok(SessionData::default()));
    };
    match state.sessions.load(&id).await {
        Ok(Some(data)) => (id, Ok(data)),
        Ok(None) => (new_session_id(), Ok(SessionData::default())),
        Err(e) => (id, Err(e.into())),
    }
}

async fn execute(
    state: &AppState,
    op: Operation,
    session: &mut SessionData,
    uri: &Uri,
) -> Result<Fields, ApiError> {
    let lifecycle = &state.lifecycle;
    match op {
        Operation::InitiateAuth => {
            lifecycle.initiate_auth(session).await;
            Ok(Fields::new())
        }
        Operation::CompleteCallback => {
            let callback = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
            lifecycle.complete_callback(session, callback).await?;
            Ok(Fields::new())
        }
        Operation::RefreshToken => {
            lifecycle.refresh_token(session).await?;
            Ok(Fields::new())
        }
        Operation::Disconnect => {
            lifecycle.disconnect(session).await?;
            Ok(Fields::new())
        }
        Operation::Invoices => {
            let ctx = TenantContext::from_session(session, lifecycle.client())?;
            fields(pipelines::invoices::run(&ctx, &state.fixtures).await?)
        }
        Operation::AttachmentInvoice => {
            let ctx = TenantContext::from_session(session, lifecycle.client())?;
            fields(pipelines::attachment::run(&ctx, &state.settings.attachment_path).await?)
        }
        Operation::PurchaseOrders => {
            let ctx = TenantContext::from_session(session, lifecycle.client())?;
            fields(pipelines::purchase_orders::run(&ctx, &state.fixtures).await?)
        }
        Operation::Quotes => {
            let ctx = TenantContext::from_session(session, lifecycle.client())?;
            let outcome =
                pipelines::quotes::run(&ctx, &state.fixtures, &state.settings.attachment_path)
                    .await?;
            fields(outcome)
        }
    }
}

/// Flatten an operation outcome into top-level response fields.
fn fields<T: Serialize>(outcome: T) -> Result<Fields, ApiError> {
    match serde_json::to_value(outcome)? {
        Value::Object(map) => Ok(map),
        other => Ok(Fields::from_iter([("result".to_string(), other)])),
    }
}

fn success_body(consent_url: &str, session: &SessionData, fields: Fields) -> Result<Value, ApiError> {
    let mut body = Fields::new();
    body.insert("consentUrl".into(), Value::from(consent_url));
    body.insert(
        "authenticated".into(),
        serde_json::to_value(AuthenticationView::from_session(session))?,
    );
    body.extend(fields);
    Ok(Value::Object(body))
}

fn failure_body(state: &AppState, op: Operation, consent_url: &str, err: &ApiError) -> Value {
    state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
    if err.is_upstream() {
        record_upstream_error(err.kind());
        warn!(route = op.route(), kind = err.kind(), error = %err, "xero call failed");
    } else {
        info!(route = op.route(), kind = err.kind(), error = %err, "request rejected");
    }
    json!({
        "consentUrl": consent_url,
        "error": {
            "type": err.kind(),
            "message": err.to_string(),
        },
    })
}
