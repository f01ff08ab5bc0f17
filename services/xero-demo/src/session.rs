//! Browser sessions
//!
//! A session is identified by an opaque UUID carried in an HttpOnly cookie
//! and holds everything the token lifecycle needs between requests: the
//! OAuth `state` of the pending consent, the current [`TokenSet`], the
//! decoded claims and the tenant list with its active tenant.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use uuid::Uuid;
use xero_auth::{Claims, Tenant, TokenSet};

use crate::error::SessionError;

/// Per-session state.
///
/// The tenant list and the active tenant are private so the active tenant
/// is always a member of the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    /// `state` sent with the consent URL and expected back on the callback
    pub oauth_state: Option<String>,
    pub token_set: Option<TokenSet>,
    pub decoded_id_token: Option<Claims>,
    pub decoded_access_token: Option<Claims>,
    tenants: Vec<Tenant>,
    /// Connection id of the active tenant
    active: Option<String>,
}

impl SessionData {
    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    pub fn active_tenant(&self) -> Option<&Tenant> {
        let active = self.active.as_deref()?;
        self.tenants.iter().find(|t| t.id == active)
    }

    /// Replace the tenant list, keeping the active tenant when it is still
    /// connected and falling back to the first tenant otherwise.
    pub fn sync_tenants(&mut self, tenants: Vec<Tenant>) {
        let keep = self
            .active
            .as_deref()
            .is_some_and(|id| tenants.iter().any(|t| t.id == id));
        if !keep {
            self.active = tenants.first().map(|t| t.id.clone());
        }
        self.tenants = tenants;
    }

    /// Replace the tenant list and make its first tenant active.
    pub fn reset_tenants(&mut self, tenants: Vec<Tenant>) {
        self.active = tenants.first().map(|t| t.id.clone());
        self.tenants = tenants;
    }

    /// Store a token set together with the claims decoded from it.
    pub fn set_tokens(
        &mut self,
        token_set: TokenSet,
        decoded_id_token: Option<Claims>,
        decoded_access_token: Claims,
    ) {
        self.token_set = Some(token_set);
        self.decoded_id_token = decoded_id_token;
        self.decoded_access_token = Some(decoded_access_token);
    }

    /// Forget tokens, claims and tenants. The pending OAuth state survives.
    pub fn clear_authentication(&mut self) {
        self.token_set = None;
        self.decoded_id_token = None;
        self.decoded_access_token = None;
        self.tenants.clear();
        self.active = None;
    }
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// Storage backend for sessions.
///
/// Returns boxed futures so the store can be held as `Arc<dyn SessionStore>`.
pub trait SessionStore: Send + Sync {
    fn load<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<SessionData>>;

    fn save<'a>(&'a self, id: &'a str, data: SessionData) -> StoreFuture<'a, ()>;

    /// Restart the idle timer of a stored session without replacing its data.
    fn touch<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()>;

    /// Number of live sessions, reported by `/health`.
    fn active_sessions(&self) -> StoreFuture<'_, usize>;
}

struct Entry {
    data: SessionData,
    touched: Instant,
}

/// In-process session store. An idle session stops loading once the TTL
/// has passed; [`MemorySessionStore::sweep`] reclaims the memory.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        entry.touched.elapsed() < self.ttl
    }

    /// Drop every expired session and return how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, e| self.is_live(e));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "expired sessions dropped");
        }
        evicted
    }

    /// Run [`sweep`](Self::sweep) every `period` until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}

impl SessionStore for MemorySessionStore {
    fn load<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<SessionData>> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(id) {
                Some(entry) if self.is_live(entry) => Ok(Some(entry.data.clone())),
                Some(_) => {
                    sessions.remove(id);
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    fn save<'a>(&'a self, id: &'a str, data: SessionData) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(
                id.to_string(),
                Entry {
                    data,
                    touched: Instant::now(),
                },
            );
            Ok(())
        })
    }

    fn touch<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut sessions = self.sessions.lock().await;
            if let Some(entry) = sessions.get_mut(id) {
                entry.touched = Instant::now();
            }
            Ok(())
        })
    }

    fn active_sessions(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let sessions = self.sessions.lock().await;
            Ok(sessions.values().filter(|e| self.is_live(e)).count())
        })
    }
}

/// Fresh session identifier.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// `Set-Cookie` value for the session cookie.
pub fn build_session_cookie(name: &str, id: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{name}={id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Session id from the request's `Cookie` headers. Values that are not a
/// UUID are ignored, so a client cannot pick its own session id format.
pub fn session_id_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| extract_cookie_value(header, name))
        .filter(|value| Uuid::parse_str(value).is_ok())
}

fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}
