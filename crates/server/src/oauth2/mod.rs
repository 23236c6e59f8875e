//! OAuth2 authorization server.
//!
//! ## Flow
//!
//! client -> `/authorize` -> external login (no session) -> `/consent` -> `/authorize`
//! issues a code -> client backend -> `/token` -> `/userinfo`
//!
//! ## Endpoints
//!
//! - `GET /authorize` - Authorization endpoint
//! - `GET|POST /consent` - Consent view and decision
//! - `POST /token` - Token endpoint (authorization code and refresh token grants)
//! - `GET /userinfo` - Profile of the bearer token's subject
//! - `GET /applications` - Public application lookup
//! - `GET|POST|DELETE /admin/applications` - Application registry
//! - `GET|DELETE /user/sessions` - The signed-in user's sessions

pub mod applications;
pub mod authorize;
pub mod codec;
pub mod consent;
pub mod replay;
pub mod session;
mod state;
pub mod token;
pub mod userinfo;

pub use codec::{CodecError, TokenCodec, TokenKind};
pub use replay::ConsumedCodes;
pub use state::{OAuth2Settings, OAuth2State};

use utoipa_axum::{router::OpenApiRouter, routes};

/// OpenAPI tag for OAuth2 protocol endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
/// OpenAPI tag for application registry endpoints
pub const APPLICATIONS_TAG: &str = "Applications";
/// OpenAPI tag for session endpoints
pub const SESSIONS_TAG: &str = "Sessions";

/// Creates the authorization server router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize::authorize))
        .routes(routes!(consent::consent_view, consent::consent_decision))
        .routes(routes!(token::token))
        .routes(routes!(userinfo::userinfo))
        .routes(routes!(applications::get_application))
        .routes(routes!(
            applications::list_applications,
            applications::create_application,
            applications::delete_application
        ))
        .routes(routes!(
            session::list_user_sessions,
            session::delete_user_session
        ))
        .with_state(state)
}
