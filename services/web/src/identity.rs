//! Login flow against the identity provider
//!
//! Each session moves through a small state machine:
//!
//! ```text
//! Anonymous --begin--> Pending --callback ok--> Authenticated
//!                         \--callback failed--> Anonymous
//! ```
//!
//! Starting a login from an authenticated session keeps the identity inside
//! the pending state; a failed callback puts it back. Only logout or expiry
//! ends an authenticated session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    models::Identity,
    oauth::{AuthorizationRequest, IdentityProvider, OAuthUserProfile},
    session::SessionManager,
    validation::validate_email,
};

/// How long the provider round trip may take before the callback is refused
pub const PENDING_LOGIN_TTL_MINUTES: i64 = 10;

/// Secrets kept between the redirect and the callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingLogin {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub started_at: DateTime<Utc>,
    /// Identity the session held when the login started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Identity>,
}

/// Login state stored per session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
    Anonymous,
    Pending(PendingLogin),
    Authenticated { identity: Identity },
}

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Reasons a login attempt fails
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Failed to build authorization request: {0}")]
    Authorize(#[source] anyhow::Error),

    #[error("No login is in progress for this session")]
    NoPendingLogin,

    #[error("Login attempt expired")]
    Expired,

    #[error("State parameter does not match the login in progress")]
    StateMismatch,

    #[error("Identity provider refused the login: {0}")]
    ProviderDenied(String),

    #[error("Callback is missing the authorization code")]
    MissingCode,

    #[error("Authorization code exchange failed: {0}")]
    Exchange(#[source] anyhow::Error),

    #[error("Profile fetch failed: {0}")]
    Profile(#[source] anyhow::Error),

    #[error("Profile has no email address")]
    MissingEmail,

    #[error("Profile email is not usable: {0}")]
    InvalidEmail(String),

    #[error("Session storage failed: {0}")]
    Session(#[source] anyhow::Error),
}

impl LoginState {
    /// Any state → Pending, carrying over the current identity
    pub fn begin(self, request: &AuthorizationRequest, now: DateTime<Utc>) -> Self {
        LoginState::Pending(PendingLogin {
            csrf_token: request.csrf_token.clone(),
            pkce_verifier: request.pkce_verifier.clone(),
            started_at: now,
            previous: self.into_identity(),
        })
    }

    /// Identity the session is signed in as
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            LoginState::Authenticated { identity } => Some(identity),
            LoginState::Pending(pending) => pending.previous.as_ref(),
            LoginState::Anonymous => None,
        }
    }

    fn into_identity(self) -> Option<Identity> {
        match self {
            LoginState::Authenticated { identity } => Some(identity),
            LoginState::Pending(pending) => pending.previous,
            LoginState::Anonymous => None,
        }
    }
}

impl PendingLogin {
    /// Check the callback against this pending login and return the code
    pub fn verify<'a>(
        &self,
        params: &'a CallbackParams,
        now: DateTime<Utc>,
    ) -> Result<&'a str, LoginError> {
        if let Some(error) = &params.error {
            return Err(LoginError::ProviderDenied(error.clone()));
        }

        if now - self.started_at > Duration::minutes(PENDING_LOGIN_TTL_MINUTES) {
            return Err(LoginError::Expired);
        }

        if params.state.as_deref() != Some(self.csrf_token.as_str()) {
            return Err(LoginError::StateMismatch);
        }

        params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(LoginError::MissingCode)
    }
}

/// Build the session identity from a provider profile
pub fn identity_from_profile(profile: OAuthUserProfile) -> Result<Identity, LoginError> {
    let email = profile
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .ok_or(LoginError::MissingEmail)?;

    validate_email(&email).map_err(LoginError::InvalidEmail)?;

    if profile.email_verified == Some(false) {
        return Err(LoginError::InvalidEmail(format!(
            "{} is not verified by the provider",
            email
        )));
    }

    Ok(Identity {
        email,
        name: profile.name,
        picture: profile.picture,
    })
}

/// Session/identity gateway used by the router
#[derive(Clone)]
pub struct IdentityGateway {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionManager,
}

impl IdentityGateway {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: SessionManager) -> Self {
        Self { provider, sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Start a login and return the provider URL to redirect to
    pub async fn begin_login(&self, session_id: &str) -> Result<String, LoginError> {
        let request = self
            .provider
            .authorization_request()
            .map_err(LoginError::Authorize)?;

        let current = self
            .sessions
            .load(session_id)
            .await
            .map_err(LoginError::Session)?;

        self.sessions
            .save(session_id, &current.begin(&request, Utc::now()))
            .await
            .map_err(LoginError::Session)?;

        info!("Login started for session {}", session_id);
        Ok(request.url)
    }

    /// Finish a login from the provider callback
    ///
    /// On any failure the session falls back to the identity it held before
    /// the login started, or to anonymous.
    pub async fn complete_login(
        &self,
        session_id: &str,
        params: &CallbackParams,
    ) -> Result<Identity, LoginError> {
        let pending = match self
            .sessions
            .load(session_id)
            .await
            .map_err(LoginError::Session)?
        {
            LoginState::Pending(pending) => pending,
            _ => return Err(LoginError::NoPendingLogin),
        };

        match self.authenticate(&pending, params).await {
            Ok(identity) => {
                let state = LoginState::Authenticated {
                    identity: identity.clone(),
                };
                self.sessions
                    .save(session_id, &state)
                    .await
                    .map_err(LoginError::Session)?;

                info!("Session {} authenticated as {}", session_id, identity.email);
                Ok(identity)
            }
            Err(e) => {
                warn!("Login failed for session {}: {}", session_id, e);
                let restored = match pending.previous {
                    Some(identity) => {
                        self.sessions
                            .save(session_id, &LoginState::Authenticated { identity })
                            .await
                    }
                    None => self.sessions.delete(session_id).await,
                };
                restored.map_err(LoginError::Session)?;
                Err(e)
            }
        }
    }

    async fn authenticate(
        &self,
        pending: &PendingLogin,
        params: &CallbackParams,
    ) -> Result<Identity, LoginError> {
        let code = pending.verify(params, Utc::now())?;

        let access_token = self
            .provider
            .exchange_code(code, &pending.pkce_verifier)
            .await
            .map_err(LoginError::Exchange)?;

        let profile = self
            .provider
            .fetch_profile(&access_token)
            .await
            .map_err(LoginError::Profile)?;

        identity_from_profile(profile)
    }

    /// Forget the session's identity
    pub async fn logout(&self, session_id: &str) -> Result<(), LoginError> {
        self.sessions
            .delete(session_id)
            .await
            .map_err(LoginError::Session)
    }

    /// Identity of the session, if it is authenticated
    pub async fn current_identity(&self, session_id: &str) -> Result<Option<Identity>, LoginError> {
        let state = self
            .sessions
            .load(session_id)
            .await
            .map_err(LoginError::Session)?;

        Ok(state.identity().cloned())
    }
}
