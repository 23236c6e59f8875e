//! Token endpoint: exchanges an authorization code or a refresh token for a fresh
//! access/refresh token pair.

use crate::error::{ErrorResponse, OAuthError, StoreError};
use crate::oauth2::codec::{
    AccessTokenClaims, AuthorizationCodeClaims, RefreshTokenClaims, TokenKind,
};
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use crate::store::{Application, User};
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: TokenUser,
}

/// Client credentials from HTTP Basic auth, falling back to the form body.
fn client_credentials(
    headers: &HeaderMap,
    params: &TokenRequest,
) -> (Option<String>, Option<String>) {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(auth.trim())
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    (params.client_id.clone(), params.client_secret.clone())
}

fn required<'a>(value: &'a Option<String>, detail: &'static str) -> Result<&'a str, OAuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(OAuthError::InvalidRequest(detail))
}

/// Look the client up and compare its secret in constant time.
async fn authenticate_client(
    state: &OAuth2State,
    client_id: &str,
    client_secret: &str,
) -> Result<Application, OAuthError> {
    let application = match state.clients.lookup(client_id).await {
        Ok(app) => app,
        Err(StoreError::NotFound) => {
            tracing::warn!(client_id, "token request from unknown client");
            return Err(OAuthError::InvalidClient);
        }
        Err(e) => return Err(e.into()),
    };
    let matches: bool = application
        .client_secret
        .as_bytes()
        .ct_eq(client_secret.as_bytes())
        .into();
    if !matches {
        tracing::warn!(client_id, "client secret mismatch");
        return Err(OAuthError::InvalidClient);
    }
    Ok(application)
}

async fn load_user(state: &OAuth2State, user_id: &str) -> Result<User, OAuthError> {
    state.users.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id, "grant references a missing user");
        OAuthError::InvalidGrant
    })
}

/// Mint an access/refresh pair for `user` on behalf of `client_id`.
fn mint_tokens(
    state: &OAuth2State,
    client_id: &str,
    user: User,
) -> Result<TokenResponse, OAuthError> {
    let settings = &state.settings;
    let access_token = state
        .codec
        .issue(
            TokenKind::AccessToken,
            &AccessTokenClaims {
                sub: user.id.clone(),
                email: user.email.clone(),
                name: user.name.clone(),
            },
            settings.access_ttl,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "failed to sign access token");
            OAuthError::ServerError
        })?;
    let refresh_token = state
        .codec
        .issue(
            TokenKind::RefreshToken,
            &RefreshTokenClaims {
                sub: user.id.clone(),
                client_id: client_id.to_string(),
            },
            settings.refresh_ttl,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "failed to sign refresh token");
            OAuthError::ServerError
        })?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: settings.access_ttl.whole_seconds(),
        refresh_token,
        user: TokenUser {
            id: user.id,
            email: user.email,
            name: user.name,
        },
    })
}

/// Redeem an authorization code.
pub async fn exchange_code(
    state: &OAuth2State,
    headers: &HeaderMap,
    params: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let code = required(&params.code, "code is required")?;
    let redirect_uri = required(&params.redirect_uri, "redirect_uri is required")?;
    let (client_id, client_secret) = client_credentials(headers, params);
    let client_id = required(&client_id, "client_id is required")?;
    let client_secret = required(&client_secret, "client_secret is required")?;

    let application = authenticate_client(state, client_id, client_secret).await?;

    let verified = state
        .codec
        .verify::<AuthorizationCodeClaims>(code, TokenKind::AuthorizationCode)
        .map_err(|e| {
            tracing::info!(client_id, reason = %e, "authorization code rejected");
            OAuthError::InvalidGrant
        })?;
    let claims = &verified.claims;
    if claims.client_id != application.client_id || claims.redirect_uri != redirect_uri {
        tracing::warn!(client_id, "authorization code does not match request");
        return Err(OAuthError::InvalidGrant);
    }

    let user = load_user(state, &claims.user_id).await?;

    if let Some(consumed) = &state.consumed_codes
        && !consumed.consume(code, verified.expires_at)
    {
        tracing::warn!(client_id, user_id = %user.id, "authorization code replayed");
        return Err(OAuthError::InvalidGrant);
    }

    let response = mint_tokens(state, &application.client_id, user)?;
    tracing::info!(client_id, user_id = %response.user.id, "tokens issued for authorization code");
    Ok(response)
}

/// Redeem a refresh token issued to the authenticating client.
pub async fn refresh(
    state: &OAuth2State,
    headers: &HeaderMap,
    params: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let refresh_token = required(&params.refresh_token, "refresh_token is required")?;
    let (client_id, client_secret) = client_credentials(headers, params);
    let client_id = required(&client_id, "client_id is required")?;
    let client_secret = required(&client_secret, "client_secret is required")?;

    let application = authenticate_client(state, client_id, client_secret).await?;

    let verified = state
        .codec
        .verify::<RefreshTokenClaims>(refresh_token, TokenKind::RefreshToken)
        .map_err(|e| {
            tracing::info!(client_id, reason = %e, "refresh token rejected");
            OAuthError::InvalidGrant
        })?;
    if verified.claims.client_id != application.client_id {
        tracing::warn!(client_id, "refresh token belongs to another client");
        return Err(OAuthError::InvalidGrant);
    }

    let user = load_user(state, &verified.claims.sub).await?;
    let response = mint_tokens(state, &application.client_id, user)?;
    tracing::info!(client_id, user_id = %response.user.id, "tokens refreshed");
    Ok(response)
}

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, headers, params), fields(grant_type = ?params.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange an authorization code or refresh token for tokens",
    description = "**Supported grant types:**\n\
                   - `authorization_code`: requires `code`, `redirect_uri`, `client_id` and `client_secret`\n\
                   - `refresh_token`: requires `refresh_token`, `client_id` and `client_secret`\n\n\
                   Client credentials may be sent with HTTP Basic auth instead of the form body. \
                   Authorization codes can be redeemed once.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Missing parameters, unsupported grant, or invalid code", body = ErrorResponse),
        (status = 401, description = "Unknown client or wrong client secret", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    WithRejection(Form(params), _): WithRejection<Form<TokenRequest>, OAuthError>,
) -> Response {
    let result = match required(&params.grant_type, "grant_type is required") {
        Ok("authorization_code") => exchange_code(&state, &headers, &params).await,
        Ok("refresh_token") => refresh(&state, &headers, &params).await,
        Ok(_) => Err(OAuthError::UnsupportedGrantType),
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}
