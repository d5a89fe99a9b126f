//! OAuth2 integration with the Google identity provider

use anyhow::Result;
use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
    reqwest::async_http_client,
};
use serde::Deserialize;
use tracing::info;

/// OAuth2 configuration for a provider
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a Google OAuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_CLIENT_ID`: OAuth client id (required)
    /// - `GOOGLE_CLIENT_SECRET`: OAuth client secret (required)
    /// - `OAUTH_REDIRECT_URL`: Callback URL registered with Google (default: "http://127.0.0.1:8000/auth")
    pub fn google_from_env() -> Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("GOOGLE_CLIENT_ID environment variable not set"))?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("GOOGLE_CLIENT_SECRET environment variable not set"))?;
        let redirect_url = std::env::var("OAUTH_REDIRECT_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/auth".to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        })
    }
}

/// Authorization redirect plus the secrets needed to finish the flow
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_token: String,
    pub pkce_verifier: String,
}

/// OAuth user profile information
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OAuthUserProfile {
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Authorization-code flow against a third-party provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the redirect that starts the flow
    fn authorization_request(&self) -> Result<AuthorizationRequest>;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String>;

    /// Fetch the profile the access token grants access to
    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthUserProfile>;
}

/// Google OpenID Connect provider
#[derive(Clone)]
pub struct GoogleProvider {
    client: BasicClient,
    http: reqwest::Client,
    config: OAuthConfig,
}

impl GoogleProvider {
    /// Create a new OAuth2 client for Google
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone())?,
            Some(TokenUrl::new(config.token_url.clone())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone())?);

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest> {
        info!("Generating Google authorization URL");

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);

        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = request.url();

        Ok(AuthorizationRequest {
            url: auth_url.to_string(),
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String> {
        info!("Exchanging authorization code for access token");

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(async_http_client)
            .await?;

        Ok(token_response.access_token().secret().clone())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthUserProfile> {
        info!("Getting Google user profile");

        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<OAuthUserProfile>().await?)
        } else {
            Err(anyhow::anyhow!(
                "Failed to get Google user profile: {}",
                response.status()
            ))
        }
    }
}
