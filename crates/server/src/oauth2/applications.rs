//! Client application endpoints.
//!
//! `GET /applications` exposes the public fields of one application for login and consent
//! pages. The `/admin/applications` endpoints manage registrations and require a session.

use crate::error::{ApiError, ErrorResponse};
use crate::oauth2::session::RequireSession;
use crate::oauth2::{APPLICATIONS_TAG, state::OAuth2State};
use crate::store::Application;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};

/// Fields of an application that are safe to show to anyone.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicApplication {
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub redirect_uris: Vec<String>,
}

impl From<Application> for PublicApplication {
    fn from(app: Application) -> Self {
        Self {
            redirect_uris: app.redirect_uris_list(),
            id: app.id,
            name: app.name,
            client_id: app.client_id,
        }
    }
}

/// Full registration, including the client secret.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<Application> for ApplicationDetails {
    fn from(app: Application) -> Self {
        Self {
            redirect_uris: app.redirect_uris_list(),
            id: app.id,
            name: app.name,
            client_id: app.client_id,
            client_secret: app.client_secret,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ApplicationQuery {
    /// Public client identifier
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub name: String,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteApplicationRequest {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteApplicationResponse {
    pub success: bool,
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/applications",
    tag = APPLICATIONS_TAG,
    operation_id = "Get Application",
    summary = "Look up an application's public details",
    params(ApplicationQuery),
    responses(
        (status = 200, description = "Application found", body = PublicApplication),
        (status = 400, description = "clientId is missing", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
    )
)]
pub async fn get_application(
    State(state): State<OAuth2State>,
    Query(query): Query<ApplicationQuery>,
) -> Result<Json<PublicApplication>, ApiError> {
    let client_id = query
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("clientId is required"))?;
    let app = state.clients.lookup(&client_id).await?;
    Ok(Json(app.into()))
}

#[tracing::instrument(skip_all, fields(user_id = %session.user_id))]
#[utoipa::path(
    get,
    path = "/admin/applications",
    tag = APPLICATIONS_TAG,
    operation_id = "List Applications",
    summary = "List every registered application",
    responses(
        (status = 200, description = "Registered applications", body = Vec<ApplicationDetails>),
        (status = 401, description = "No authenticated session", body = ErrorResponse),
    )
)]
pub async fn list_applications(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
) -> Result<Json<Vec<ApplicationDetails>>, ApiError> {
    let apps = state.clients.list().await?;
    Ok(Json(apps.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip_all, fields(user_id = %session.user_id, name = %body.name))]
#[utoipa::path(
    post,
    path = "/admin/applications",
    tag = APPLICATIONS_TAG,
    operation_id = "Create Application",
    summary = "Register a new application",
    description = "Generates a fresh `clientId` and `clientSecret`. The secret is only ever \
                   returned by the admin endpoints.",
    request_body = CreateApplicationRequest,
    responses(
        (status = 200, description = "Application registered", body = ApplicationDetails),
        (status = 400, description = "Empty name or redirect URIs", body = ErrorResponse),
        (status = 401, description = "No authenticated session", body = ErrorResponse),
        (status = 409, description = "Generated clientId collided", body = ErrorResponse),
    )
)]
pub async fn create_application(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<Json<ApplicationDetails>, ApiError> {
    let app = state.clients.create(&body.name, body.redirect_uris).await?;
    Ok(Json(app.into()))
}

#[tracing::instrument(skip_all, fields(user_id = %session.user_id, id = %body.id))]
#[utoipa::path(
    delete,
    path = "/admin/applications",
    tag = APPLICATIONS_TAG,
    operation_id = "Delete Application",
    summary = "Delete a registered application",
    request_body = DeleteApplicationRequest,
    responses(
        (status = 200, description = "Application deleted", body = DeleteApplicationResponse),
        (status = 400, description = "Missing id", body = ErrorResponse),
        (status = 401, description = "No authenticated session", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
    )
)]
pub async fn delete_application(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
    Json(body): Json<DeleteApplicationRequest>,
) -> Result<Json<DeleteApplicationResponse>, ApiError> {
    if body.id.is_empty() {
        return Err(ApiError::bad_request("id is required"));
    }
    state.clients.delete(&body.id).await?;
    tracing::info!("application deleted");
    Ok(Json(DeleteApplicationResponse { success: true }))
}
