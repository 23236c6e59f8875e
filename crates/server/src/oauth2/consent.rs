//! OAuth2 Consent endpoints.
//!
//! - Consent view (GET) - describes the application and the requested scopes
//! - Consent decision (POST) - allow resumes the authorization flow, deny returns
//!   `access_denied` to the client
//!
//! Scopes are shown for information only; issued tokens are not restricted by them.

use crate::error::{ErrorResponse, OAuthError};
use crate::oauth2::authorize::{AuthorizeRequest, ValidatedRequest, validate_request};
use crate::oauth2::session::RequireSession;
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use axum::{
    Form, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Scope information for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScopeInfo {
    pub name: String,
    pub description: String,
}

/// Get human-readable scope information.
fn scope_info(scope: &str) -> ScopeInfo {
    match scope {
        "openid" => ScopeInfo {
            name: "OpenID".to_string(),
            description: "Verify your identity".to_string(),
        },
        "email" => ScopeInfo {
            name: "Email".to_string(),
            description: "Access your email address".to_string(),
        },
        "profile" => ScopeInfo {
            name: "Profile".to_string(),
            description: "Access your name and picture".to_string(),
        },
        _ => ScopeInfo {
            name: scope.to_string(),
            description: format!("Access to {scope}"),
        },
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsentApplication {
    pub name: String,
    pub client_id: String,
}

/// What the consent screen shows and echoes back on submit.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConsentView {
    pub application: ConsentApplication,
    pub scopes: Vec<ScopeInfo>,
    /// The client asks for the user's email address
    pub email: bool,
    /// The client asks for the user's profile
    pub profile: bool,
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub scope: String,
}

impl ConsentView {
    fn new(validated: ValidatedRequest) -> Self {
        let scopes: Vec<ScopeInfo> = validated.scope.split_whitespace().map(scope_info).collect();
        let email = validated.scope.split_whitespace().any(|s| s == "email");
        let profile = validated.scope.split_whitespace().any(|s| s == "profile");
        Self {
            scopes,
            email,
            profile,
            client_id: validated.application.client_id.clone(),
            application: ConsentApplication {
                name: validated.application.name,
                client_id: validated.application.client_id,
            },
            redirect_uri: validated.redirect_uri,
            response_type: "code".to_string(),
            state: validated.state,
            scope: validated.scope,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    Allow,
    Deny,
}

/// Form data for consent submission.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsentForm {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub decision: ConsentDecision,
}

impl ConsentForm {
    fn authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            response_type: self.response_type.clone(),
            state: self.state.clone(),
            scope: self.scope.clone(),
            consent: None,
        }
    }
}

/// Redirect target for a denied request: the client's redirect URI with `access_denied`.
pub fn deny_redirect(validated: &ValidatedRequest) -> Result<Url, OAuthError> {
    let mut url = Url::parse(&validated.redirect_uri)
        .map_err(|_| OAuthError::InvalidRequest("redirect_uri is not an absolute URL"))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", OAuthError::AccessDenied.code());
        if let Some(state) = &validated.state {
            pairs.append_pair("state", state);
        }
    }
    Ok(url)
}

/// Redirect target for an approved request: back to `/authorize` with the consent marker.
pub fn allow_redirect(oauth: &OAuth2State, validated: &ValidatedRequest) -> Result<Url, OAuthError> {
    let mut url = oauth.settings.public_endpoint("/authorize").map_err(|e| {
        tracing::error!(error = %e, "authorize URL cannot be built");
        OAuthError::ServerError
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("client_id", &validated.application.client_id)
            .append_pair("redirect_uri", &validated.redirect_uri)
            .append_pair("response_type", "code");
        if !validated.scope.is_empty() {
            pairs.append_pair("scope", &validated.scope);
        }
        if let Some(state) = &validated.state {
            pairs.append_pair("state", state);
        }
        pairs.append_pair("consent", "true");
    }
    Ok(url)
}

/// Consent view.
#[tracing::instrument(skip_all, fields(user_id = %session.user_id))]
#[utoipa::path(
    get,
    path = "/consent",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Consent View",
    summary = "Describe a pending authorization request",
    description = "Returns the application and requested scopes for the consent screen. Takes \
                   the same query parameters as `/authorize`.",
    params(AuthorizeRequest),
    responses(
        (status = 200, description = "Consent details", body = ConsentView),
        (status = 400, description = "Missing or malformed parameters", body = ErrorResponse),
        (status = 401, description = "No session, unknown client, or unregistered redirect_uri", body = ErrorResponse),
    )
)]
pub async fn consent_view(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
    WithRejection(Query(params), _): WithRejection<Query<AuthorizeRequest>, OAuthError>,
) -> Response {
    match validate_request(state.clients.as_ref(), &params).await {
        Ok(validated) => Json(ConsentView::new(validated)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Consent decision.
#[tracing::instrument(skip_all, fields(user_id = %session.user_id, decision = ?form.decision))]
#[utoipa::path(
    post,
    path = "/consent",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Consent Decision",
    summary = "Allow or deny a pending authorization request",
    description = "On `allow` the user is sent back to `/authorize` with `consent=true`. On \
                   `deny` the user is sent to the client's `redirect_uri` with \
                   `error=access_denied` and the echoed `state`. The request is validated \
                   again first, so a deny never redirects to an unregistered URI.",
    request_body(
        content = ConsentForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Authorization parameters plus the user's decision"
    ),
    responses(
        (status = 303, description = "Redirect to /authorize or to the client"),
        (status = 400, description = "Missing or malformed parameters", body = ErrorResponse),
        (status = 401, description = "No session, unknown client, or unregistered redirect_uri", body = ErrorResponse),
    )
)]
pub async fn consent_decision(
    State(state): State<OAuth2State>,
    RequireSession(session): RequireSession,
    WithRejection(Form(form), _): WithRejection<Form<ConsentForm>, OAuthError>,
) -> Response {
    let validated = match validate_request(state.clients.as_ref(), &form.authorize_request()).await
    {
        Ok(validated) => validated,
        Err(e) => return e.into_response(),
    };

    let target = match form.decision {
        ConsentDecision::Allow => allow_redirect(&state, &validated),
        ConsentDecision::Deny => {
            tracing::info!(client_id = %validated.application.client_id, "consent denied");
            deny_redirect(&validated)
        }
    };
    match target {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Application;
    use time::OffsetDateTime;

    fn validated(state: Option<&str>, scope: &str) -> ValidatedRequest {
        let now = OffsetDateTime::now_utc();
        ValidatedRequest {
            application: Application {
                id: "app-1".into(),
                name: "Demo".into(),
                client_id: "cid".into(),
                client_secret: "secret".into(),
                redirect_uris: r#"["https://a.test/cb"]"#.into(),
                created_at: now,
                updated_at: now,
            },
            redirect_uri: "https://a.test/cb".into(),
            state: state.map(String::from),
            scope: scope.into(),
        }
    }

    #[test]
    fn deny_redirect_carries_error_and_state() {
        let url = deny_redirect(&validated(Some("a b&c"), "")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("error".to_string(), "access_denied".to_string()),
                ("state".to_string(), "a b&c".to_string()),
            ]
        );
        assert_eq!(url.host_str(), Some("a.test"));
        assert_eq!(url.path(), "/cb");
    }

    #[test]
    fn deny_redirect_without_state() {
        let url = deny_redirect(&validated(None, "")).unwrap();
        assert_eq!(url.query(), Some("error=access_denied"));
    }

    #[test]
    fn view_flags_email_and_profile() {
        let view = ConsentView::new(validated(None, "openid email"));
        assert!(view.email);
        assert!(!view.profile);
        assert_eq!(view.scopes.len(), 2);
        assert_eq!(view.scopes[1].name, "Email");
        assert_eq!(view.application.client_id, "cid");
    }

    #[test]
    fn unknown_scope_gets_generic_description() {
        assert_eq!(scope_info("calendar").description, "Access to calendar");
    }
}
