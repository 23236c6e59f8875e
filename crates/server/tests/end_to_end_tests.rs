//! Full authorization-code flow against the assembled router.

mod common;

use axum_test::TestServer;
use common::*;
use serde_json::json;
use sso_server::oauth2::applications::ApplicationDetails;
use sso_server::oauth2::token::TokenResponse;
use sso_server::oauth2::userinfo::UserInfoResponse;
use url::Url;

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

async fn register_app(server: &TestServer, redirect_uri: &str) -> ApplicationDetails {
    let (name, value) = session_cookie(ALICE_SESSION_TOKEN);
    let response = server
        .post("/admin/applications")
        .add_header(name, value)
        .json(&json!({ "name": "Flow App", "redirectUris": [redirect_uri] }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let (server, _oauth, _resources) = create_test_server(true).await;
    let app = register_app(&server, "https://flow.test/cb").await;
    let (cookie_name, cookie_value) = session_cookie(ALICE_SESSION_TOKEN);

    // 1. no consent yet: sent to the consent page
    let response = server
        .get("/authorize")
        .add_query_param("response_type", "code")
        .add_query_param("client_id", &app.client_id)
        .add_query_param("redirect_uri", "https://flow.test/cb")
        .add_query_param("scope", "email profile")
        .add_query_param("state", "xyz")
        .add_header(cookie_name.clone(), cookie_value.clone())
        .await;
    response.assert_status_see_other();
    let consent_url = location(&response);
    assert_eq!(consent_url.path(), "/consent");
    assert_eq!(query_param(&consent_url, "state").as_deref(), Some("xyz"));

    // 2. consent page describes the request
    let view = server
        .get(&path_and_query(&consent_url))
        .add_header(cookie_name.clone(), cookie_value.clone())
        .await;
    view.assert_status_ok();
    let body: serde_json::Value = view.json();
    assert_eq!(body["application"]["name"], "Flow App");
    assert_eq!(body["state"], "xyz");

    // 3. user allows
    let response = server
        .post("/consent")
        .add_header(cookie_name.clone(), cookie_value.clone())
        .form(&[
            ("client_id", app.client_id.as_str()),
            ("redirect_uri", "https://flow.test/cb"),
            ("response_type", "code"),
            ("scope", "email profile"),
            ("state", "xyz"),
            ("decision", "allow"),
        ])
        .await;
    response.assert_status_see_other();
    let back_to_authorize = location(&response);
    assert_eq!(back_to_authorize.path(), "/authorize");
    assert_eq!(
        query_param(&back_to_authorize, "state").as_deref(),
        Some("xyz")
    );

    // 4. authorize again, now with consent: code issued
    let response = server
        .get(&path_and_query(&back_to_authorize))
        .add_header(cookie_name, cookie_value)
        .await;
    response.assert_status_see_other();
    let callback = location(&response);
    assert_eq!(callback.host_str(), Some("flow.test"));
    assert_eq!(callback.path(), "/cb");
    assert_eq!(query_param(&callback, "state").as_deref(), Some("xyz"));
    let code = query_param(&callback, "code").expect("code in callback");

    // 5. exchange the code
    let response = server
        .post("/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", "https://flow.test/cb"),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
        ])
        .await;
    response.assert_status_ok();
    let tokens: TokenResponse = response.json();
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(tokens.user.id, ALICE_ID);

    // 6. resolve the user
    let (name, value) = bearer(&tokens.access_token);
    let response = server.get("/userinfo").add_header(name, value).await;
    response.assert_status_ok();
    let user: UserInfoResponse = response.json();
    assert_eq!(user.id, ALICE_ID);
    assert_eq!(user.email, "alice@example.test");

    // 7. the code cannot be redeemed twice
    let response = server
        .post("/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", "https://flow.test/cb"),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
        ])
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_unauthenticated_flow_starts_at_login() {
    let (server, _oauth, _resources) = create_test_server(true).await;

    let response = server
        .get("/authorize")
        .add_query_param("response_type", "code")
        .add_query_param("client_id", CLIENT_ID)
        .add_query_param("redirect_uri", REDIRECT_URI)
        .add_query_param("state", "xyz")
        .await;

    response.assert_status_see_other();
    let login = location(&response);
    assert_eq!(login.path(), "/login");
    let return_url = query_param(&login, "returnUrl").expect("returnUrl");
    assert!(return_url.starts_with("/authorize?"));
    assert!(return_url.contains("state=xyz"));
}

#[tokio::test]
async fn test_refresh_then_userinfo() {
    let (server, _oauth, _resources) = create_test_server(true).await;
    let code = authorize_code(&server, Some("s1")).await;
    let issued: TokenResponse = server
        .post("/token")
        .form(&code_exchange_form(&code))
        .await
        .json();

    let (name, value) = basic_auth(CLIENT_ID, CLIENT_SECRET);
    let response = server
        .post("/token")
        .add_header(name, value)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", issued.refresh_token.as_str()),
        ])
        .await;
    response.assert_status_ok();
    let refreshed: TokenResponse = response.json();

    let (name, value) = bearer(&refreshed.access_token);
    let user: UserInfoResponse = server.get("/userinfo").add_header(name, value).await.json();
    assert_eq!(user.id, ALICE_ID);
}

#[tokio::test]
async fn test_health_check() {
    let (server, _oauth, _resources) = create_test_server(true).await;

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (server, _oauth, _resources) = create_test_server(true).await;

    server.get("/api-docs").await.assert_status_ok();
}
