//! Error type for the web service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{classifier::ClassifierError, identity::LoginError, views};

/// Errors a request handler can end with
#[derive(Error, Debug)]
pub enum WebError {
    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Multipart body could not be read, e.g. over the size limit
    #[error("Upload rejected ({status}): {message}")]
    Upload { status: StatusCode, message: String },

    /// Login flow failure
    #[error(transparent)]
    Login(#[from] LoginError),

    /// Classification failure
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// Infrastructure failure
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Upload { status, .. } => *status,
            WebError::Login(LoginError::Exchange(_) | LoginError::Profile(_)) => {
                StatusCode::BAD_GATEWAY
            }
            WebError::Login(LoginError::Authorize(_) | LoginError::Session(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::Login(_) => StatusCode::BAD_REQUEST,
            WebError::Classifier(_) | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            WebError::BadRequest(msg) => msg.clone(),
            WebError::Upload { message, .. } => message.clone(),
            WebError::Login(e) if status == StatusCode::BAD_REQUEST => e.to_string(),
            WebError::Login(_) => "Login failed, please try again".to_string(),
            WebError::Classifier(_) => "Could not classify the image".to_string(),
            WebError::Internal(_) => "Internal server error".to_string(),
        };

        if status.is_server_error() {
            tracing::error!("{}: {:#}", status, self);
        } else {
            tracing::warn!("{}: {}", status, self);
        }

        (status, views::error_page(status, &message)).into_response()
    }
}

/// Type alias for handler results
pub type WebResult<T> = Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failures_map_by_cause() {
        let denied = WebError::from(LoginError::ProviderDenied("access_denied".to_string()));
        assert_eq!(denied.status(), StatusCode::BAD_REQUEST);

        let mismatch = WebError::from(LoginError::StateMismatch);
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let exchange = WebError::from(LoginError::Exchange(anyhow::anyhow!("boom")));
        assert_eq!(exchange.status(), StatusCode::BAD_GATEWAY);

        let session = WebError::from(LoginError::Session(anyhow::anyhow!("redis down")));
        assert_eq!(session.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_details_are_not_rendered() {
        let response = WebError::from(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upload_rejection_keeps_its_status() {
        let error = WebError::Upload {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        assert_eq!(error.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn classifier_failure_is_server_error() {
        let error = WebError::from(ClassifierError::Inference("nan".to_string()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
