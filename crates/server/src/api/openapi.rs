//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::{APPLICATIONS_TAG, OAUTH2_TAG, SESSIONS_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, OAuth2, Scopes, SecurityScheme,
    },
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Access token obtained from the `/token` endpoint.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([Flow::AuthorizationCode(AuthorizationCode::new(
                "/authorize",
                "/token",
                Scopes::from_iter([
                    ("openid", "Verify your identity"),
                    ("email", "Access to user email"),
                    ("profile", "Access to user profile"),
                ]),
            ))]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "SSO Authorization Server API",
        version = "1.0.0",
        description = "OAuth2 authorization-code server for registered client applications."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 protocol endpoints"),
        (name = APPLICATIONS_TAG, description = "Client application registry"),
        (name = SESSIONS_TAG, description = "Login sessions of the signed-in user")
    )
)]
pub struct ApiDoc;
