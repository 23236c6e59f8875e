//! UserInfo endpoint.

use crate::error::{ErrorResponse, OAuthError};
use crate::oauth2::codec::{AccessTokenClaims, TokenKind};
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Profile of the token's subject, read from the user record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a bearer access token to the current profile of its subject.
pub async fn resolve(state: &OAuth2State, headers: &HeaderMap) -> Result<UserInfoResponse, OAuthError> {
    let token = bearer_token(headers).ok_or(OAuthError::InvalidToken)?;
    let verified = state
        .codec
        .verify::<AccessTokenClaims>(token, TokenKind::AccessToken)
        .map_err(|e| {
            tracing::debug!(reason = %e, "access token rejected");
            OAuthError::InvalidToken
        })?;

    let user = state
        .users
        .find_by_id(&verified.claims.sub)
        .await?
        .ok_or_else(|| {
            tracing::info!(user_id = %verified.claims.sub, "access token for a deleted user");
            OAuthError::InvalidToken
        })?;

    Ok(UserInfoResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        image: user.image,
    })
}

/// UserInfo endpoint.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/userinfo",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 UserInfo",
    summary = "Get the authenticated user's profile",
    description = "Returns the profile of the access token's subject as currently stored, so \
                   profile changes show up without reissuing tokens.\n\n\
                   **Authentication:** `Authorization: Bearer <access_token>`.",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User profile", body = UserInfoResponse),
        (status = 401, description = "Missing, malformed, invalid or expired access token", body = ErrorResponse),
    )
)]
pub async fn userinfo(State(state): State<OAuth2State>, headers: HeaderMap) -> Response {
    match resolve(&state, &headers).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => e.into_response(),
    }
}
