use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

/// Column protected by a unique constraint on `users`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {field:?}")]
    UniqueViolation { field: UniqueField },
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub String);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSigningSecret,
    #[error("token signing failed: {0}")]
    SigningFailure(String),
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token signature or claims invalid")]
    InvalidSignature,
}

/// Outward error of the auth domain. Display text is safe to hand to clients.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("username already exists")]
    UsernameTaken,
    #[error("email already exists")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("invalid token")]
    TokenInvalidSignature,
    #[error("signing secret is not configured")]
    MissingSigningSecret,
    #[error("internal server error")]
    InternalFailure(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        AuthError::InternalFailure(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::TokenInvalidSignature => StatusCode::UNAUTHORIZED,
            AuthError::MissingSigningSecret | AuthError::InternalFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::NotYetValid => AuthError::TokenNotYetValid,
            TokenError::InvalidSignature => AuthError::TokenInvalidSignature,
            TokenError::MissingSigningSecret => AuthError::MissingSigningSecret,
            signing @ TokenError::SigningFailure(_) => AuthError::internal(signing),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation {
                field: UniqueField::Username,
            } => AuthError::UsernameTaken,
            StoreError::UniqueViolation {
                field: UniqueField::Email,
            } => AuthError::EmailTaken,
            StoreError::Backend(inner) => AuthError::InternalFailure(inner),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(e: HashError) -> Self {
        AuthError::internal(e)
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), reason = %rejection.body_text(), "request body rejected");
        AuthError::Validation("invalid request body".into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AuthError::InternalFailure(cause) = &self {
            error!(error = ?cause, "internal failure");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
