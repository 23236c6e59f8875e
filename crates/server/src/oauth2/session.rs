//! Login session resolution and the signed-in user's session dashboard.
//!
//! Sessions are created by the external login component; this server only reads them from
//! the session cookie and lets their owner list or end them.

use crate::error::{ApiError, ErrorResponse, StoreError};
use crate::oauth2::{SESSIONS_TAG, state::OAuth2State};
use crate::store::SessionStore;
use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// An unexpired login session resolved from the request cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub session_id: String,
    pub user_id: String,
}

/// Resolve the session cookie to a live session. Unknown and expired sessions yield `None`.
pub async fn resolve_session(
    state: &OAuth2State,
    jar: &CookieJar,
) -> Result<Option<AuthSession>, StoreError> {
    let Some(cookie) = jar.get(&state.settings.cookie_name) else {
        return Ok(None);
    };
    let token = cookie.value();
    if token.is_empty() {
        return Ok(None);
    }

    match state.sessions.find_by_token(token).await? {
        Some(session) if !session.is_expired() => Ok(Some(AuthSession {
            session_id: session.id,
            user_id: session.user_id,
        })),
        Some(session) => {
            tracing::debug!(session_id = %session.id, "ignoring expired session");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Extractor rejecting requests without a live session with 401.
pub struct RequireSession(pub AuthSession);

impl FromRequestParts<OAuth2State> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &OAuth2State,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        resolve_session(state, &jar)
            .await?
            .map(RequireSession)
            .ok_or_else(ApiError::unauthorized)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub expires: OffsetDateTime,
    /// Whether this is the session making the request
    pub current: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionRequest {
    pub session_id: String,
}

/// Every session of `user_id`, with the caller's own one marked.
pub async fn list_sessions(
    store: &dyn SessionStore,
    user_id: &str,
    current_session_id: &str,
) -> Result<Vec<SessionSummary>, StoreError> {
    let sessions = store.list_for_user(user_id).await?;
    Ok(sessions
        .into_iter()
        .map(|s| SessionSummary {
            current: s.id == current_session_id,
            id: s.id,
            expires: s.expires,
        })
        .collect())
}

/// Delete one of `user_id`'s sessions other than the current one.
pub async fn delete_session(
    store: &dyn SessionStore,
    session_id: &str,
    user_id: &str,
    current_session_id: &str,
) -> Result<(), StoreError> {
    if session_id == current_session_id {
        return Err(StoreError::InvalidOperation(
            "cannot delete the current session".into(),
        ));
    }
    let session = store
        .find_by_id(session_id)
        .await?
        .ok_or(StoreError::NotFound)?;
    if session.user_id != user_id {
        return Err(StoreError::Forbidden);
    }
    store.delete(session_id).await
}

#[tracing::instrument(skip_all, fields(user_id = %session.user_id))]
#[utoipa::path(
    get,
    path = "/user/sessions",
    tag = SESSIONS_TAG,
    operation_id = "List Sessions",
    summary = "List the signed-in user's sessions",
    description = "Returns every login session of the signed-in user. The session used for this \
                   request is flagged with `current: true`.",
    responses(
        (status = 200, description = "Sessions of the signed-in user", body = Vec<SessionSummary>),
        (status = 401, description = "No authenticated session", body = ErrorResponse),
    )
)]
pub async fn list_user_sessions(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions =
        list_sessions(state.sessions.as_ref(), &session.user_id, &session.session_id).await?;
    Ok(Json(sessions))
}

#[tracing::instrument(skip_all, fields(user_id = %session.user_id, target_session = %body.session_id))]
#[utoipa::path(
    delete,
    path = "/user/sessions",
    tag = SESSIONS_TAG,
    operation_id = "Delete Session",
    summary = "End another session of the signed-in user",
    description = "Deletes a session belonging to the signed-in user. The session making the \
                   request cannot delete itself.",
    request_body = DeleteSessionRequest,
    responses(
        (status = 204, description = "Session deleted"),
        (status = 400, description = "Attempt to delete the current session", body = ErrorResponse),
        (status = 401, description = "No authenticated session", body = ErrorResponse),
        (status = 403, description = "Session belongs to another user", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn delete_user_session(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
    Json(body): Json<DeleteSessionRequest>,
) -> Result<StatusCode, ApiError> {
    delete_session(
        state.sessions.as_ref(),
        &body.session_id,
        &session.user_id,
        &session.session_id,
    )
    .await?;
    tracing::info!("session deleted");
    Ok(StatusCode::NO_CONTENT)
}
