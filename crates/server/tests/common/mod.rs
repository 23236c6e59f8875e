//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::{TestResponse, TestServer};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use sso_server::{
    AppResources, api,
    config::{AppConfig, OAuth2Config, SessionConfig},
    oauth2::OAuth2State,
};
use std::sync::Arc;
use url::Url;

pub const SIGNING_SECRET: &str = "integration-test-signing-secret-0123456789";
pub const PUBLIC_URL: &str = "http://localhost:8080";

pub const CLIENT_ID: &str = "client-1";
pub const CLIENT_SECRET: &str = "secret-1";
pub const REDIRECT_URI: &str = "https://a.test/cb";

pub const OTHER_CLIENT_ID: &str = "client-2";
pub const OTHER_CLIENT_SECRET: &str = "secret-2";
pub const OTHER_REDIRECT_URI: &str = "https://b.test/cb";

pub const ALICE_ID: &str = "user-alice";
pub const BOB_ID: &str = "user-bob";

/// Alice's live session, used by most tests
pub const ALICE_SESSION_ID: &str = "sess-alice-1";
pub const ALICE_SESSION_TOKEN: &str = "token-alice-1";
/// A second live session of Alice's
pub const ALICE_OTHER_SESSION_ID: &str = "sess-alice-2";
pub const ALICE_EXPIRED_SESSION_TOKEN: &str = "token-alice-expired";
pub const BOB_SESSION_ID: &str = "sess-bob-1";
pub const BOB_SESSION_TOKEN: &str = "token-bob-1";

pub fn test_config(single_use_codes: bool) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        public_url: PUBLIC_URL.parse().expect("public url"),
        bind_addr: "127.0.0.1:0".into(),
        store_timeout_ms: 5000,
        oauth2: OAuth2Config {
            signing_secret: SIGNING_SECRET.into(),
            authorization_code_lifetime: 600,
            access_token_lifetime: 3600,
            refresh_token_lifetime: 604800,
            single_use_codes,
        },
        session: SessionConfig::default(),
        seed_demo_data: false,
    }
}

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(DbBackend::Sqlite, sql))
        .await
        .unwrap_or_else(|e| panic!("seed statement failed: {e}\n{sql}"));
}

/// In-memory database with the schema applied and two users, their sessions and two
/// applications seeded.
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("apply migrations");

    exec(
        &db,
        r#"INSERT INTO user_account (id, email, name, image, created_at) VALUES
           ('user-alice', 'alice@example.test', 'Alice', 'https://img.test/alice.png', '2026-01-01T00:00:00Z'),
           ('user-bob', 'bob@example.test', NULL, NULL, '2026-01-01T00:00:00Z');"#,
    )
    .await;

    exec(
        &db,
        r#"INSERT INTO user_session (id, session_token, user_id, expires) VALUES
           ('sess-alice-1', 'token-alice-1', 'user-alice', '2099-01-01T00:00:00Z'),
           ('sess-alice-2', 'token-alice-2', 'user-alice', '2098-01-01T00:00:00Z'),
           ('sess-alice-old', 'token-alice-expired', 'user-alice', '2000-01-01T00:00:00Z'),
           ('sess-bob-1', 'token-bob-1', 'user-bob', '2099-01-01T00:00:00Z');"#,
    )
    .await;

    exec(
        &db,
        r#"INSERT INTO application (id, name, client_id, client_secret, redirect_uris, created_at, updated_at) VALUES
           ('app-1', 'Demo App', 'client-1', 'secret-1', '["https://a.test/cb","https://a.test/other"]', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
           ('app-2', 'Other App', 'client-2', 'secret-2', '["https://b.test/cb"]', '2026-01-02T00:00:00Z', '2026-01-02T00:00:00Z');"#,
    )
    .await;

    db
}

pub async fn create_test_state(single_use_codes: bool) -> (OAuth2State, AppResources) {
    let db = Arc::new(create_test_db().await);
    let config = Arc::new(test_config(single_use_codes));
    let oauth = OAuth2State::from_db(db.clone(), &config).expect("oauth2 state");
    (oauth, AppResources { db, config })
}

/// Full application router, as served by the binary.
pub async fn create_test_server(single_use_codes: bool) -> (TestServer, OAuth2State, AppResources) {
    let (oauth, resources) = create_test_state(single_use_codes).await;
    let server = TestServer::new(api::app(oauth.clone(), resources.clone()))
        .expect("create test server");
    (server, oauth, resources)
}

pub fn session_cookie(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::COOKIE,
        HeaderValue::from_str(&format!("sso_session={token}")).expect("cookie header"),
    )
}

pub fn basic_auth(client_id: &str, client_secret: &str) -> (HeaderName, HeaderValue) {
    use base64::Engine;
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{client_id}:{client_secret}"));
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).expect("authorization header"),
    )
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("authorization header"),
    )
}

/// `Location` of a redirect response, resolved against the public URL.
pub fn location(response: &TestResponse) -> Url {
    let raw = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header");
    Url::parse(PUBLIC_URL)
        .and_then(|base| base.join(raw))
        .expect("location is a URL")
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Run `/authorize` as Alice with consent given and return the issued code.
pub async fn authorize_code(server: &TestServer, state: Option<&str>) -> String {
    let (name, value) = session_cookie(ALICE_SESSION_TOKEN);
    let mut request = server
        .get("/authorize")
        .add_query_param("response_type", "code")
        .add_query_param("client_id", CLIENT_ID)
        .add_query_param("redirect_uri", REDIRECT_URI)
        .add_query_param("scope", "email profile")
        .add_query_param("consent", "true")
        .add_header(name, value);
    if let Some(state) = state {
        request = request.add_query_param("state", state);
    }
    let response = request.await;
    response.assert_status_see_other();
    query_param(&location(&response), "code").expect("code in redirect")
}

/// Form body of an authorization code exchange for the demo client.
pub fn code_exchange_form(code: &str) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", REDIRECT_URI.to_string()),
        ("client_id", CLIENT_ID.to_string()),
        ("client_secret", CLIENT_SECRET.to_string()),
    ]
}
