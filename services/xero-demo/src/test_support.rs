//! In-process stand-in for Xero's identity, connections and Accounting APIs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use xero_accounting::AccountingApi;
use xero_auth::{ClientConfig, Endpoints, Organisation, Tenant, TokenSet, XeroClient, unix_now};

use crate::AppState;
use crate::fixtures::{Fixtures, INVALID_ACCOUNT_CODE};
use crate::lifecycle::TokenLifecycle;
use crate::metrics::ServiceMetrics;
use crate::pipelines::TenantContext;
use crate::routes::RouteSettings;
use crate::session::MemorySessionStore;

pub const USER_EMAIL: &str = "rick@example.com";
pub const USER_SUB: &str = "5f4b0c1e-7a29-4d1b-9c43-0e6a2d8f1b77";
const ACCESS_TOKEN_TTL: i64 = 1800;

#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub grant_type: String,
    /// Authorization code or refresh token presented
    pub credential: String,
    pub issued_access_token: String,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
pub struct MockState {
    pub connections: Vec<Value>,
    pub bearer_seen: Vec<String>,
    pub fail_connections: bool,
    pub reject_refresh: bool,
    pub token_requests: Vec<TokenRequest>,
    pub last_access_token: String,
    pub accounting_calls: Vec<(String, String)>,
    /// Accounting path that answers 500
    pub fail_path: Option<String>,
    /// Accounting GET path that answers only after the given delay
    pub slow_path: Option<(String, Duration)>,
    pub contacts: Vec<Value>,
    pub invoices: Vec<Value>,
    pub paid_invoice_ids: Vec<String>,
    pub purchase_orders: Vec<Value>,
    pub quotes: Vec<Value>,
    pub uploads: Vec<Upload>,
    issued_codes: Vec<String>,
    used_codes: Vec<String>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockXero {
    pub base: String,
    pub state: Shared,
}

impl MockXero {
    /// Serve on an ephemeral port with the given connections and one seeded contact.
    pub async fn start(connections: Vec<Value>) -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            connections,
            contacts: vec![json!({
                "ContactID": "contact-seed",
                "Name": "Bayside Club",
                "EmailAddress": "secretarybob@bsclub.co",
            })],
            ..Default::default()
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let app = Router::new()
            .route("/connect/token", post(token))
            .route("/connections", get(list_connections))
            .route("/connections/{id}", delete(delete_connection))
            .fallback(accounting)
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base, state }
    }

    /// Authorization code the token endpoint will accept exactly once.
    pub fn next_code(&self) -> String {
        let mut s = self.state.lock().unwrap();
        let code = s.next_id("code");
        s.issued_codes.push(code.clone());
        code
    }
}

pub fn jwt(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

pub fn xero_client(base: &str) -> XeroClient {
    XeroClient::new(ClientConfig {
        client_id: "cid".into(),
        client_secret: Secret::from("secret"),
        redirect_uri: "http://localhost:5000/xero/callback".into(),
        scopes: vec!["openid".into(), "email".into(), "offline_access".into()],
        endpoints: Endpoints::rooted_at(base),
        http_timeout: Duration::from_secs(3),
    })
    .unwrap()
}

pub fn connection(id: &str, tenant: &str) -> Value {
    json!({
        "id": id,
        "tenantId": tenant,
        "tenantType": "ORGANISATION",
        "tenantName": format!("Demo Company {tenant}"),
    })
}

pub fn token_set(access: &str) -> TokenSet {
    TokenSet {
        access_token: access.into(),
        id_token: None,
        refresh_token: Some("rt_0".into()),
        expires_at: unix_now() + 600,
        token_type: "Bearer".into(),
        scope: None,
    }
}

/// Pipeline context for tenant `t1` of the mock, signed in as [`USER_EMAIL`].
pub fn context_for(mock: &MockXero) -> TenantContext {
    let mut tenant: Tenant = serde_json::from_value(connection("c1", "t1")).unwrap();
    tenant.org_data = Some(Organisation {
        base_currency: Some("NZD".into()),
        ..Default::default()
    });
    let api = AccountingApi::new(
        reqwest::Client::new(),
        &format!("{}/api.xro/2.0", mock.base),
        "at_test",
        "t1",
    )
    .unwrap();
    TenantContext {
        api,
        tenant,
        email: Some(USER_EMAIL.into()),
    }
}

/// Application state wired to the mock, with a Prometheus handle that is not
/// installed globally and an attachment path that does not exist.
pub fn test_app_state(base: &str) -> AppState {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    AppState {
        lifecycle: Arc::new(TokenLifecycle::new(xero_client(base), false)),
        sessions: Arc::new(MemorySessionStore::new(Duration::from_secs(3600))),
        fixtures: Arc::new(Fixtures),
        settings: Arc::new(RouteSettings {
            cookie_name: "xero_session".into(),
            session_ttl: Duration::from_secs(3600),
            secure_cookie: false,
            attachment_path: "/nonexistent/xero-dev.png".into(),
        }),
        metrics: ServiceMetrics::new(),
        prometheus: recorder.handle(),
    }
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim_start_matches("Bearer ")
        .to_string()
}

fn invalid_grant() -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response()
}

async fn token(State(s): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut s = s.lock().unwrap();
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    let credential = match grant_type.as_str() {
        "authorization_code" => {
            let code = form.get("code").cloned().unwrap_or_default();
            if !s.issued_codes.contains(&code) || s.used_codes.contains(&code) {
                return invalid_grant();
            }
            s.used_codes.push(code.clone());
            code
        }
        "refresh_token" => {
            if s.reject_refresh {
                return invalid_grant();
            }
            form.get("refresh_token").cloned().unwrap_or_default()
        }
        _ => return invalid_grant(),
    };

    let now = unix_now();
    let jti = s.next_id("at");
    let access_token = jwt(&json!({
        "sub": USER_SUB,
        "exp": now + ACCESS_TOKEN_TTL,
        "iat": now,
        "jti": jti,
    }));
    let id_token = jwt(&json!({
        "sub": USER_SUB,
        "email": USER_EMAIL,
        "given_name": "Rick",
        "family_name": "James",
    }));
    let refresh_token = s.next_id("rt");

    s.token_requests.push(TokenRequest {
        grant_type,
        credential,
        issued_access_token: access_token.clone(),
    });
    s.last_access_token = access_token.clone();

    Json(json!({
        "access_token": access_token,
        "id_token": id_token,
        "refresh_token": refresh_token,
        "expires_in": ACCESS_TOKEN_TTL,
        "token_type": "Bearer",
        "scope": "openid email offline_access",
    }))
    .into_response()
}

async fn list_connections(State(s): State<Shared>, headers: HeaderMap) -> Response {
    let mut s = s.lock().unwrap();
    s.bearer_seen.push(bearer(&headers));
    if s.fail_connections {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(Value::Array(s.connections.clone())).into_response()
}

async fn delete_connection(State(s): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut s = s.lock().unwrap();
    if s.fail_connections {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    s.connections.retain(|c| c["id"] != id.as_str());
    StatusCode::NO_CONTENT
}

fn has_invalid_account(invoice: &Value) -> bool {
    invoice["LineItems"]
        .as_array()
        .is_some_and(|lines| lines.iter().any(|l| l["AccountCode"] == INVALID_ACCOUNT_CODE))
}

/// Assign ids to `items` and store them, returning what the platform echoes back.
fn store_new(s: &mut MockState, items: Vec<Value>, id_field: &str, prefix: &str) -> Vec<Value> {
    items
        .into_iter()
        .map(|mut item| {
            if prefix == "inv" && has_invalid_account(&item) {
                item["HasErrors"] = json!(true);
                item["ValidationErrors"] = json!([{
                    "Message": format!(
                        "Account code '{INVALID_ACCOUNT_CODE}' is not a valid code for this document."
                    )
                }]);
                return item;
            }
            item[id_field] = json!(s.next_id(prefix));
            let stored = item.clone();
            match prefix {
                "contact" => s.contacts.push(stored),
                "inv" => s.invoices.push(stored),
                "po" => s.purchase_orders.push(stored),
                _ => s.quotes.push(stored),
            }
            item
        })
        .collect()
}

fn merge(target: &mut Value, update: &Value) {
    if let (Some(target), Some(update)) = (target.as_object_mut(), update.as_object()) {
        for (key, value) in update {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn find<'a>(items: &'a mut [Value], id_field: &str, id: &str) -> Option<&'a mut Value> {
    items.iter_mut().find(|item| item[id_field] == id)
}

fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

async fn accounting(
    State(s): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let Some(rest) = path.strip_prefix("/api.xro/2.0/") else {
        return not_found();
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let query = uri.query().unwrap_or_default();
    let json_body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let delay = s
        .lock()
        .unwrap()
        .slow_path
        .clone()
        .filter(|(slow, _)| method == Method::GET && *slow == path)
        .map(|(_, delay)| delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut s = s.lock().unwrap();
    s.accounting_calls.push((method.to_string(), path.clone()));
    if s.fail_path.as_deref() == Some(path.as_str()) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"Message": "An error occurred"})),
        )
            .into_response();
    }

    let items = |key: &str| json_body[key].as_array().cloned().unwrap_or_default();

    let payload = match (method.as_str(), segments.as_slice()) {
        ("GET", ["Organisation"]) => {
            let tenant = headers
                .get("xero-tenant-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            json!({"Organisations": [{"OrganisationID": tenant, "BaseCurrency": "NZD"}]})
        }
        ("GET", ["BrandingThemes"]) => json!({
            "BrandingThemes": [{"BrandingThemeID": "bt-1", "Name": "Standard", "SortOrder": 0}]
        }),
        ("GET", ["Accounts"]) => json!({
            "Accounts": [{
                "AccountID": "acc-1",
                "Code": "429",
                "Name": "General Expenses",
                "Type": "EXPENSE",
                "Status": "ACTIVE",
            }]
        }),
        ("GET", ["Contacts"]) => json!({"Contacts": s.contacts}),
        ("PUT", ["Contacts"]) => {
            json!({"Contacts": store_new(&mut s, items("Contacts"), "ContactID", "contact")})
        }

        ("GET", ["Invoices"]) if query.contains("Statuses=") => {
            let paid: Vec<Value> = s
                .paid_invoice_ids
                .iter()
                .map(|id| json!({"InvoiceID": id, "Status": "PAID"}))
                .collect();
            json!({"Invoices": paid})
        }
        ("GET", ["Invoices"]) => json!({"Invoices": s.invoices}),
        ("PUT" | "POST", ["Invoices"]) => {
            json!({"Invoices": store_new(&mut s, items("Invoices"), "InvoiceID", "inv")})
        }
        ("GET", ["Invoices", id]) => match find(&mut s.invoices, "InvoiceID", id) {
            Some(invoice) => json!({"Invoices": [invoice.clone()]}),
            None => return not_found(),
        },
        ("POST", ["Invoices", id]) => {
            let update = items("Invoices").into_iter().next().unwrap_or_default();
            match find(&mut s.invoices, "InvoiceID", id) {
                Some(invoice) => {
                    merge(invoice, &update);
                    json!({"Invoices": [invoice.clone()]})
                }
                None => return not_found(),
            }
        }

        ("PUT", [collection @ ("Invoices" | "Quotes"), _, "Attachments", file_name]) => {
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            s.uploads.push(Upload {
                path: path.clone(),
                content_type: content_type.clone(),
                size: body.len(),
            });
            let attachment_id = s.next_id("att");
            json!({"Attachments": [{
                "AttachmentID": attachment_id,
                "FileName": file_name,
                "Url": format!("https://api.xero.com/api.xro/2.0/{collection}/Attachments/{file_name}"),
                "MimeType": content_type,
                "ContentLength": body.len(),
                "IncludeOnline": query.contains("IncludeOnline=true"),
            }]})
        }

        ("GET", ["PurchaseOrders"]) => json!({"PurchaseOrders": s.purchase_orders}),
        ("PUT", ["PurchaseOrders"]) => json!({
            "PurchaseOrders": store_new(&mut s, items("PurchaseOrders"), "PurchaseOrderID", "po")
        }),
        ("GET", ["PurchaseOrders", id]) => {
            match find(&mut s.purchase_orders, "PurchaseOrderID", id) {
                Some(order) => json!({"PurchaseOrders": [order.clone()]}),
                None => return not_found(),
            }
        }
        ("POST", ["PurchaseOrders", id]) => {
            let update = items("PurchaseOrders").into_iter().next().unwrap_or_default();
            match find(&mut s.purchase_orders, "PurchaseOrderID", id) {
                Some(order) => {
                    merge(order, &update);
                    json!({"PurchaseOrders": [order.clone()]})
                }
                None => return not_found(),
            }
        }

        ("GET", ["Quotes"]) => json!({"Quotes": s.quotes}),
        ("POST", ["Quotes"]) => {
            json!({"Quotes": store_new(&mut s, items("Quotes"), "QuoteID", "quote")})
        }
        ("GET", ["Quotes", id]) => match find(&mut s.quotes, "QuoteID", id) {
            Some(quote) => json!({"Quotes": [quote.clone()]}),
            None => return not_found(),
        },

        _ => return not_found(),
    };
    Json(payload).into_response()
}
