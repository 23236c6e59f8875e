//! OAuth2 state management.
//!
//! Provides the state shared by every authorization server handler.

use crate::config::AppConfig;
use crate::oauth2::codec::{CodecError, TokenCodec};
use crate::oauth2::replay::ConsumedCodes;
use crate::store::{ClientRegistry, SeaOrmStore, SessionStore, UserStore};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use url::Url;

/// Static settings derived from configuration.
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    /// Externally visible base URL, also the token issuer
    pub public_url: Url,
    /// External login entry point
    pub login_url: String,
    pub cookie_name: String,
    pub code_ttl: time::Duration,
    pub access_ttl: time::Duration,
    pub refresh_ttl: time::Duration,
}

impl OAuth2Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            public_url: config.public_url.clone(),
            login_url: config.session.login_url.clone(),
            cookie_name: config.session.cookie_name.clone(),
            code_ttl: time::Duration::seconds(config.oauth2.authorization_code_lifetime),
            access_ttl: time::Duration::seconds(config.oauth2.access_token_lifetime),
            refresh_ttl: time::Duration::seconds(config.oauth2.refresh_token_lifetime),
        }
    }

    /// Issuer string carried in every token.
    pub fn issuer(&self) -> String {
        self.public_url.as_str().trim_end_matches('/').to_string()
    }

    /// Resolve a path against the public base URL.
    pub fn public_endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.public_url.join(path)
    }

    /// Resolve the login URL, which may be relative to the public base URL.
    pub fn login_endpoint(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.login_url).or_else(|_| self.public_url.join(&self.login_url))
    }
}

/// State containing all components needed for the authorization server.
#[derive(Clone)]
pub struct OAuth2State {
    pub clients: Arc<dyn ClientRegistry>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub codec: TokenCodec,
    /// Present when codes are single-use
    pub consumed_codes: Option<ConsumedCodes>,
    pub settings: Arc<OAuth2Settings>,
}

impl OAuth2State {
    pub fn new(
        clients: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        config: &AppConfig,
    ) -> Result<Self, CodecError> {
        let settings = OAuth2Settings::from_config(config);
        let codec = TokenCodec::new(config.oauth2.signing_secret.as_bytes(), settings.issuer())?;
        let consumed_codes = config.oauth2.single_use_codes.then(ConsumedCodes::new);
        Ok(Self {
            clients,
            users,
            sessions,
            codec,
            consumed_codes,
            settings: Arc::new(settings),
        })
    }

    /// Build the state on top of a SeaORM connection.
    pub fn from_db(db: Arc<DatabaseConnection>, config: &AppConfig) -> Result<Self, CodecError> {
        let store = Arc::new(SeaOrmStore::new(db, config.store_timeout()));
        Self::new(store.clone(), store.clone(), store, config)
    }
}
