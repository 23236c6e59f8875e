use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_SIGNING_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Deserialize)]
pub struct OAuth2Config {
    /// Symmetric secret used to sign codes and tokens. Required, no fallback.
    pub signing_secret: String,
    /// Authorization code lifetime in seconds
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    /// Reject a second redemption of the same authorization code
    #[serde(default = "default_single_use_codes")]
    pub single_use_codes: bool,
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("signing_secret", &"<redacted>")
            .field(
                "authorization_code_lifetime",
                &self.authorization_code_lifetime,
            )
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("single_use_codes", &self.single_use_codes)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token set by the login component
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// External login entry point, absolute or relative to `public_url`
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            login_url: default_login_url(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Externally visible base URL; used as token issuer and to build redirects
    pub public_url: Url,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Upper bound for every repository call, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub session: SessionConfig,
    /// Insert the demo admin account and `example-client` application at startup
    #[serde(default)]
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Check invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth2.signing_secret.len() < MIN_SIGNING_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "oauth2.signing_secret must be at least {MIN_SIGNING_SECRET_LEN} bytes"
            )));
        }
        let lifetimes = [
            (
                "oauth2.authorization_code_lifetime",
                self.oauth2.authorization_code_lifetime,
            ),
            (
                "oauth2.access_token_lifetime",
                self.oauth2.access_token_lifetime,
            ),
            (
                "oauth2.refresh_token_lifetime",
                self.oauth2.refresh_token_lifetime,
            ),
        ];
        for (key, value) in lifetimes {
            if value <= 0 {
                return Err(ConfigError::Validation(format!("{key} must be > 0")));
            }
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Validation("store_timeout_ms must be > 0".into()));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.cookie_name must not be empty".into(),
            ));
        }
        if self.public_url.cannot_be_a_base() {
            return Err(ConfigError::Validation(
                "public_url must be an absolute http(s) URL".into(),
            ));
        }
        Ok(())
    }
}

fn default_authorization_code_lifetime() -> i64 {
    600 // 10 minutes
}

fn default_access_token_lifetime() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 7 // 7 days
}

fn default_single_use_codes() -> bool {
    true
}

fn default_cookie_name() -> String {
    "sso_session".to_string()
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_timeout_ms() -> u64 {
    5000
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `OAUTH2__SIGNING_SECRET`) overrides the file value. A `.env` file is honoured.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

/// Same as [`load_config`] with an explicit file path. The file is optional so a
/// purely environment-driven deployment works.
pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let _ = dotenvy::dotenv();

    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
