//! Server-side session storage keyed by a signed cookie
//!
//! The browser only holds a random session id in a signed cookie. The login
//! state for that id lives in the key/value store under `session:{id}`.

use anyhow::Result;
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use common::cache::KeyValueStore;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::identity::LoginState;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session_id";

/// Session manager for handling login state in the key/value store
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    ttl_seconds: u64,
    secure_cookie: bool,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_seconds: u64, secure_cookie: bool) -> Self {
        Self {
            store,
            ttl_seconds,
            secure_cookie,
        }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }

    /// Load the login state of a session
    ///
    /// Unknown, expired or unreadable sessions are anonymous.
    pub async fn load(&self, session_id: &str) -> Result<LoginState> {
        let Some(raw) = self.store.get(&Self::key(session_id)).await? else {
            return Ok(LoginState::Anonymous);
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!("Discarding unreadable session {}: {}", session_id, e);
                Ok(LoginState::Anonymous)
            }
        }
    }

    /// Store the login state of a session, refreshing its expiry
    pub async fn save(&self, session_id: &str, state: &LoginState) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        self.store
            .set(&Self::key(session_id), &raw, Some(self.ttl_seconds))
            .await
    }

    /// Delete a session. Deleting an unknown session is not an error.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        info!("Deleting session {}", session_id);
        self.store.delete(&Self::key(session_id)).await
    }

    /// Session id carried by the request, if any
    pub fn session_id(&self, jar: &SignedCookieJar) -> Option<String> {
        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| Uuid::parse_str(id).is_ok())
    }

    /// Session id carried by the request, issuing a new cookie when absent
    pub fn ensure_session_id(&self, jar: SignedCookieJar) -> (SignedCookieJar, String) {
        if let Some(id) = self.session_id(&jar) {
            return (jar, id);
        }

        let id = Uuid::new_v4().to_string();
        let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie);

        (jar.add(cookie), id)
    }

    /// Drop the session cookie from the browser
    pub fn clear_cookie(&self, jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }

    /// Check the backing store
    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }
}
