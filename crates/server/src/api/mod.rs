//! HTTP surface of the server.
//!
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! The protocol endpoints themselves live in [`crate::oauth2`].

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::AppResources;
use crate::oauth2::{self, OAuth2State};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the full application router with docs and middleware.
pub fn app(oauth: OAuth2State, resources: AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(oauth2::router(oauth))
        .routes(routes!(health::health))
        .layer(axum::Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip_all)]
pub async fn start_webserver(
    oauth: OAuth2State,
    resources: AppResources,
) -> color_eyre::Result<()> {
    let bind_addr = resources.config.bind_addr.clone();
    let router = app(oauth, resources);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
