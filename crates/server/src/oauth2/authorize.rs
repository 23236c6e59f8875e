//! Authorization endpoint.
//!
//! The request walks `ValidateRequest -> ResolveSession -> CheckConsent -> IssueAndRedirect`.
//! Each state yields a [`Transition`]: either the next state or a terminal redirect or error.

use crate::error::{ErrorResponse, OAuthError, StoreError};
use crate::oauth2::codec::{AuthorizationCodeClaims, TokenKind};
use crate::oauth2::session::{AuthSession, resolve_session};
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use crate::store::{Application, ClientRegistry};
use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde::Deserialize;
use url::Url;
use utoipa::IntoParams;

/// Query parameters of an authorization request. All optional so that missing values
/// surface as `invalid_request`; a repeated or undecodable parameter is rejected the same way.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeRequest {
    /// Public client identifier
    pub client_id: Option<String>,
    /// Must exactly match a registered redirect URI
    pub redirect_uri: Option<String>,
    /// Must be `code`
    pub response_type: Option<String>,
    /// Opaque value echoed back to the client
    pub state: Option<String>,
    /// Space-separated scopes, informational only
    pub scope: Option<String>,
    /// `true` once the user approved the consent screen
    pub consent: Option<String>,
}

/// An authorization request whose client and redirect URI checked out.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub application: Application,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub scope: String,
}

#[derive(Debug)]
pub enum AuthorizeState {
    ValidateRequest,
    ResolveSession(ValidatedRequest),
    CheckConsent(ValidatedRequest, AuthSession),
    IssueAndRedirect(ValidatedRequest, AuthSession),
}

#[derive(Debug)]
pub enum Transition {
    Proceed(AuthorizeState),
    RedirectTo(Url),
    JsonError(OAuthError),
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Check the request shape, the client and the redirect URI.
pub async fn validate_request(
    clients: &dyn ClientRegistry,
    request: &AuthorizeRequest,
) -> Result<ValidatedRequest, OAuthError> {
    if request.response_type.as_deref() != Some("code") {
        return Err(OAuthError::InvalidRequest("response_type must be `code`"));
    }
    let client_id = non_empty(request.client_id.as_deref())
        .ok_or(OAuthError::InvalidRequest("client_id is required"))?;
    let redirect_uri = non_empty(request.redirect_uri.as_deref())
        .ok_or(OAuthError::InvalidRequest("redirect_uri is required"))?;

    let application = match clients.lookup(client_id).await {
        Ok(app) => app,
        Err(StoreError::NotFound) => {
            tracing::warn!(client_id, "authorization request for unknown client");
            return Err(OAuthError::UnauthorizedClient);
        }
        Err(e) => return Err(e.into()),
    };
    if !application.is_redirect_uri_allowed(redirect_uri) {
        tracing::warn!(client_id, redirect_uri, "redirect_uri not registered for client");
        return Err(OAuthError::UnauthorizedClient);
    }

    Ok(ValidatedRequest {
        application,
        redirect_uri: redirect_uri.to_string(),
        state: non_empty(request.state.as_deref()).map(String::from),
        scope: request.scope.clone().unwrap_or_default(),
    })
}

/// Inputs of one pass through the state machine.
pub struct AuthorizeFlow<'a> {
    pub oauth: &'a OAuth2State,
    pub request: &'a AuthorizeRequest,
    /// Query string exactly as received, forwarded to login and consent
    pub raw_query: &'a str,
    pub jar: &'a CookieJar,
}

impl AuthorizeFlow<'_> {
    /// Drive the machine from `ValidateRequest` to a terminal transition.
    pub async fn run(&self) -> Transition {
        let mut current = AuthorizeState::ValidateRequest;
        loop {
            match self.step(current).await {
                Transition::Proceed(next) => current = next,
                terminal => return terminal,
            }
        }
    }

    pub async fn step(&self, current: AuthorizeState) -> Transition {
        match current {
            AuthorizeState::ValidateRequest => {
                match validate_request(self.oauth.clients.as_ref(), self.request).await {
                    Ok(validated) => Transition::Proceed(AuthorizeState::ResolveSession(validated)),
                    Err(e) => Transition::JsonError(e),
                }
            }
            AuthorizeState::ResolveSession(validated) => {
                match resolve_session(self.oauth, self.jar).await {
                    Ok(Some(session)) => {
                        Transition::Proceed(AuthorizeState::CheckConsent(validated, session))
                    }
                    Ok(None) => self.login_redirect(),
                    Err(e) => Transition::JsonError(e.into()),
                }
            }
            AuthorizeState::CheckConsent(validated, session) => {
                if self.request.consent.as_deref() == Some("true") {
                    Transition::Proceed(AuthorizeState::IssueAndRedirect(validated, session))
                } else {
                    self.consent_redirect()
                }
            }
            AuthorizeState::IssueAndRedirect(validated, session) => {
                self.issue_code(validated, session)
            }
        }
    }

    fn login_redirect(&self) -> Transition {
        let mut url = match self.oauth.settings.login_endpoint() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "login_url cannot be resolved");
                return Transition::JsonError(OAuthError::ServerError);
            }
        };
        let return_url = format!("/authorize?{}", self.raw_query);
        url.query_pairs_mut().append_pair("returnUrl", &return_url);
        Transition::RedirectTo(url)
    }

    fn consent_redirect(&self) -> Transition {
        match self.oauth.settings.public_endpoint("/consent") {
            Ok(mut url) => {
                url.set_query(Some(self.raw_query));
                Transition::RedirectTo(url)
            }
            Err(e) => {
                tracing::error!(error = %e, "consent URL cannot be built");
                Transition::JsonError(OAuthError::ServerError)
            }
        }
    }

    fn issue_code(&self, validated: ValidatedRequest, session: AuthSession) -> Transition {
        let Ok(mut target) = Url::parse(&validated.redirect_uri) else {
            return Transition::JsonError(OAuthError::InvalidRequest(
                "redirect_uri is not an absolute URL",
            ));
        };

        let claims = AuthorizationCodeClaims {
            client_id: validated.application.client_id.clone(),
            user_id: session.user_id,
            redirect_uri: validated.redirect_uri,
            scope: validated.scope,
        };
        let code = match self.oauth.codec.issue(
            TokenKind::AuthorizationCode,
            &claims,
            self.oauth.settings.code_ttl,
        ) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "failed to sign authorization code");
                return Transition::JsonError(OAuthError::ServerError);
            }
        };

        {
            let mut pairs = target.query_pairs_mut();
            pairs.append_pair("code", &code);
            if let Some(state) = &validated.state {
                pairs.append_pair("state", state);
            }
        }
        tracing::info!(
            client_id = %claims.client_id,
            user_id = %claims.user_id,
            "authorization code issued"
        );
        Transition::RedirectTo(target)
    }
}

/// OAuth2 Authorization endpoint.
#[tracing::instrument(skip(state, jar, raw_query, params), fields(client_id = ?params.client_id))]
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start the authorization code flow",
    description = "Validates the client and redirect URI, then sends the user to the login page \
                   (no session), to the consent screen (no `consent=true`), or back to the \
                   client's `redirect_uri` with a `code` and the echoed `state`.\n\n\
                   Malformed requests and unknown clients or redirect URIs are answered with a \
                   JSON error and never redirected.",
    params(AuthorizeRequest),
    responses(
        (status = 303, description = "Redirect to login, consent, or the client with an authorization code"),
        (status = 400, description = "Missing or malformed parameters", body = ErrorResponse),
        (status = 401, description = "Unknown client or unregistered redirect_uri", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    jar: CookieJar,
    RawQuery(raw_query): RawQuery,
    WithRejection(Query(params), _): WithRejection<Query<AuthorizeRequest>, OAuthError>,
) -> Response {
    let raw_query = raw_query.unwrap_or_default();
    let flow = AuthorizeFlow {
        oauth: &state,
        request: &params,
        raw_query: &raw_query,
        jar: &jar,
    };
    match flow.run().await {
        Transition::RedirectTo(url) => Redirect::to(url.as_str()).into_response(),
        Transition::JsonError(e) => e.into_response(),
        Transition::Proceed(_) => OAuthError::ServerError.into_response(),
    }
}
