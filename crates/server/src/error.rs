//! Error types for the authorization server.
//!
//! - [`OAuthError`]: protocol errors returned by `/authorize`, `/token` and `/userinfo`
//! - [`StoreError`]: failures of the repository layer
//! - [`ApiError`]: JSON errors for the administrative and session surfaces

use axum::{
    Json,
    extract::rejection::{FormRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("record does not belong to the caller")]
    Forbidden,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("random source unavailable: {0}")]
    RandomSource(String),
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// OAuth2 protocol errors, named after their wire `error` code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(&'static str),
    #[error("unauthorized_client")]
    UnauthorizedClient,
    #[error("invalid_client")]
    InvalidClient,
    #[error("invalid_grant")]
    InvalidGrant,
    #[error("invalid_token")]
    InvalidToken,
    #[error("unsupported_grant_type")]
    UnsupportedGrantType,
    #[error("access_denied")]
    AccessDenied,
    #[error("server_error")]
    ServerError,
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnauthorizedClient => "unauthorized_client",
            OAuthError::InvalidClient => "invalid_client",
            OAuthError::InvalidGrant => "invalid_grant",
            OAuthError::InvalidToken => "invalid_token",
            OAuthError::UnsupportedGrantType => "unsupported_grant_type",
            OAuthError::AccessDenied => "access_denied",
            OAuthError::ServerError => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OAuthError::InvalidRequest(_)
            | OAuthError::InvalidGrant
            | OAuthError::UnsupportedGrantType => StatusCode::BAD_REQUEST,
            OAuthError::UnauthorizedClient
            | OAuthError::InvalidClient
            | OAuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            OAuthError::AccessDenied => StatusCode::FORBIDDEN,
            OAuthError::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only malformed requests get a description; credential and grant failures stay
    /// opaque so callers cannot tell an expired artifact from a forged one.
    fn description(&self) -> Option<String> {
        match self {
            OAuthError::InvalidRequest(detail) => Some((*detail).to_string()),
            _ => None,
        }
    }
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store failure");
        OAuthError::ServerError
    }
}

impl From<QueryRejection> for OAuthError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "query string rejected");
        OAuthError::InvalidRequest("malformed query string")
    }
}

impl From<FormRejection> for OAuthError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "form body rejected");
        OAuthError::InvalidRequest("malformed form body")
    }
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.code().to_string(),
            error_description: self.description(),
        };
        let mut response = (status, Json(body)).into_response();
        if self == OAuthError::InvalidToken {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Bearer error="invalid_token""#),
            );
        }
        response
    }
}

/// Error for the administrative and session endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code (e.g., "unauthorized", "not_found")
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            error: "unauthorized".to_string(),
            error_description: Some("An authenticated session is required".to_string()),
        }
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self {
            error: "forbidden".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self {
            error: "not_found".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self {
            error: "bad_request".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self {
            error: "conflict".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("Record not found"),
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::InvalidInput(msg) | StoreError::InvalidOperation(msg) => {
                ApiError::bad_request(msg)
            }
            StoreError::Forbidden => ApiError::forbidden("Record does not belong to you"),
            other @ (StoreError::RandomSource(_)
            | StoreError::Timeout(_)
            | StoreError::Database(_)) => {
                tracing::error!(error = %other, "store failure");
                ApiError::server_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}
