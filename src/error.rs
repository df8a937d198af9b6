use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::{
    auth::{jwt::TokenError, repo::StoreError, validation::Violation},
    mail::NotifyError,
};

/// Failure kinds of the authentication workflows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email or username already in use")]
    Conflict,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is not activated")]
    NotActivated,
    #[error("account is already activated")]
    AlreadyActive,
    #[error("an activation email was already sent, please check your inbox")]
    AlreadySent,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("wrong token type")]
    WrongTokenType,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("insufficient role")]
    Forbidden,
    #[error("email delivery failed")]
    DeliveryFailure(#[source] NotifyError),
    #[error("validation failed")]
    Validation(Vec<Violation>),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => AuthError::Conflict,
            StoreError::NotFound => AuthError::NotFound("user"),
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::Expired,
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::WrongType => AuthError::WrongTokenType,
            TokenError::Signing(e) => AuthError::Internal(e.into()),
            e @ TokenError::Lifetime => AuthError::Internal(e.into()),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials | AuthError::NotActivated => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyActive
            | AuthError::AlreadySent
            | AuthError::InvalidToken
            | AuthError::Expired
            | AuthError::WrongTokenType
            | AuthError::InvalidOrExpiredToken
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::DeliveryFailure(_) => StatusCode::BAD_GATEWAY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<Violation>>,
}

fn error_response(status: StatusCode, message: String, errors: Option<Vec<Violation>>) -> Response {
    let body = ErrorBody {
        ok: false,
        message,
        errors,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                error_response(status, "Internal server error".into(), None)
            }
            AuthError::DeliveryFailure(e) => {
                error!(error = %e, "email delivery failed");
                error_response(status, "Email delivery failed, please try again later".into(), None)
            }
            AuthError::Validation(violations) => {
                error_response(status, "Validation failed".into(), Some(violations))
            }
            other => error_response(status, other.to_string(), None),
        }
    }
}

/// Rejection of the bearer extractor: every guard failure is a 401.
#[derive(Debug)]
pub struct Unauthorized(pub AuthError);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        match self.0 {
            AuthError::Internal(e) => AuthError::Internal(e).into_response(),
            AuthError::Expired => {
                error_response(StatusCode::UNAUTHORIZED, "Token expired".into(), None)
            }
            AuthError::NotActivated => error_response(
                StatusCode::UNAUTHORIZED,
                "User is inactive, contact admin".into(),
                None,
            ),
            _ => error_response(StatusCode::UNAUTHORIZED, "Token not valid".into(), None),
        }
    }
}
