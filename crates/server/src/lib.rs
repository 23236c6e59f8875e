//! Single-sign-on authorization server.
//!
//! Implements the OAuth2 authorization-code grant for registered client applications:
//! client and redirect URI validation, the login/consent flow, code issuance, code-for-token
//! exchange and bearer token resolution.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod store;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
