//! Web service routes

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::SignedCookieJar;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    error::{WebError, WebResult},
    identity::{CallbackParams, LoginError},
    models::{Identity, PREDICTION_COST},
    state::AppState,
    uploads::TransientUpload,
    views,
};

/// Name of the multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// Create the router for the web service
pub fn create_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/auth", get(auth_callback))
        .route("/logout", get(logout))
        .route("/predict", post(predict))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn current_identity(
    state: &AppState,
    jar: &SignedCookieJar,
) -> WebResult<Option<Identity>> {
    match state.identity.sessions().session_id(jar) {
        Some(session_id) => Ok(state.identity.current_identity(&session_id).await?),
        None => Ok(None),
    }
}

/// Home page
pub async fn home(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<impl IntoResponse> {
    let identity = current_identity(&state, &jar).await?;

    let balance = match &identity {
        Some(identity) => Some(state.accounts.get_or_create(&identity.email).await?.balance),
        None => None,
    };

    let aqi = state.air_quality.current().await;

    Ok(views::home(identity.as_ref(), balance, aqi))
}

/// Start the login flow and redirect to the identity provider
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<(SignedCookieJar, Redirect)> {
    let (jar, session_id) = state.identity.sessions().ensure_session_id(jar);
    let url = state.identity.begin_login(&session_id).await?;

    Ok((jar, Redirect::to(&url)))
}

/// OAuth callback
pub async fn auth_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> WebResult<Redirect> {
    let session_id = state
        .identity
        .sessions()
        .session_id(&jar)
        .ok_or(LoginError::NoPendingLogin)?;

    let identity = state.identity.complete_login(&session_id, &params).await?;
    state.accounts.get_or_create(&identity.email).await?;

    Ok(Redirect::to("/"))
}

/// Forget the session and drop its cookie
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<(SignedCookieJar, Redirect)> {
    if let Some(session_id) = state.identity.sessions().session_id(&jar) {
        state.identity.logout(&session_id).await?;
    }

    let jar = state.identity.sessions().clear_cookie(jar);
    Ok((jar, Redirect::to("/")))
}

/// Charge the account, classify the uploaded image and render the label
pub async fn predict(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> WebResult<Response> {
    let Some(identity) = current_identity(&state, &jar).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mut multipart = multipart.map_err(|e| WebError::Upload {
        status: e.status(),
        message: e.body_text(),
    })?;
    let (file_name, bytes) = read_upload(&mut multipart).await?;

    state.accounts.get_or_create(&identity.email).await?;

    if !state
        .accounts
        .try_deduct(&identity.email, PREDICTION_COST)
        .await?
    {
        info!("Rejected prediction for {}: insufficient balance", identity.email);
        let balance = state.accounts.get_or_create(&identity.email).await?.balance;
        return Ok(views::predict(&identity, views::NOT_ENOUGH_TOKENS, balance).into_response());
    }

    let upload = TransientUpload::persist(&state.upload_dir, &file_name, &bytes).await?;
    let outcome = state.classifier.classify_file(upload.path()).await;
    upload.remove().await;

    let label = outcome.map_err(|e| {
        error!(
            "Classification failed for {} after charging {} tokens: {}",
            identity.email, PREDICTION_COST, e
        );
        e
    })?;

    let balance = state.accounts.get_or_create(&identity.email).await?.balance;
    info!("Classified upload for {} as {}", identity.email, label);

    Ok(views::predict(&identity, label.as_str(), balance).into_response())
}

/// First non-empty `file` field of the form
async fn read_upload(multipart: &mut Multipart) -> WebResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::Upload {
            status: e.status(),
            message: e.body_text(),
        })?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::Upload {
            status: e.status(),
            message: e.body_text(),
        })?;

        if bytes.is_empty() {
            return Err(WebError::BadRequest("Uploaded file is empty".to_string()));
        }

        return Ok((file_name, bytes));
    }

    Err(WebError::BadRequest("No file uploaded".to_string()))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.accounts.health_check().await.unwrap_or_else(|e| {
        error!("Balance store health check failed: {}", e);
        false
    });
    let sessions = state.identity.sessions().health_check().await.unwrap_or_else(|e| {
        error!("Session store health check failed: {}", e);
        false
    });

    let healthy = store && sessions;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "web",
            "store": store,
            "sessions": sessions,
        })),
    )
}
