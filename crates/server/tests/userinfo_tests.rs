//! UserInfo endpoint tests.

mod common;

use axum::http::{HeaderValue, header};
use common::*;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use sso_server::oauth2::codec::{AccessTokenClaims, RefreshTokenClaims, TokenKind};
use sso_server::oauth2::token::TokenResponse;
use sso_server::oauth2::userinfo::UserInfoResponse;
use time::{Duration, OffsetDateTime};

fn alice_access_claims() -> AccessTokenClaims {
    AccessTokenClaims {
        sub: ALICE_ID.into(),
        email: "alice@example.test".into(),
        name: Some("Alice".into()),
    }
}

fn assert_invalid_token(response: &axum_test::TestResponse) {
    response.assert_status_unauthorized();
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        r#"Bearer error="invalid_token""#
    );
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_userinfo_missing_header() {
    let (server, _oauth, _resources) = create_test_server(true).await;

    let response = server.get("/userinfo").await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_wrong_scheme() {
    let (server, _oauth, _resources) = create_test_server(true).await;

    let response = server
        .get("/userinfo")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Token abc"))
        .await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_returns_profile() {
    let (server, oauth, _resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(TokenKind::AccessToken, &alice_access_claims(), Duration::hours(1))
        .unwrap();
    let (name, value) = bearer(&token);

    let response = server.get("/userinfo").add_header(name, value).await;

    response.assert_status_ok();
    let body: UserInfoResponse = response.json();
    assert_eq!(body.id, ALICE_ID);
    assert_eq!(body.email, "alice@example.test");
    assert_eq!(body.name.as_deref(), Some("Alice"));
    assert_eq!(body.image.as_deref(), Some("https://img.test/alice.png"));
}

#[tokio::test]
async fn test_userinfo_reflects_profile_changes() {
    let (server, oauth, resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(TokenKind::AccessToken, &alice_access_claims(), Duration::hours(1))
        .unwrap();

    resources
        .db
        .execute(Statement::from_string(
            DbBackend::Sqlite,
            "UPDATE user_account SET name = 'Alice Liddell' WHERE id = 'user-alice';",
        ))
        .await
        .expect("rename user");

    let (name, value) = bearer(&token);
    let response = server.get("/userinfo").add_header(name, value).await;

    response.assert_status_ok();
    let body: UserInfoResponse = response.json();
    assert_eq!(body.name.as_deref(), Some("Alice Liddell"));
}

#[tokio::test]
async fn test_userinfo_rejects_altered_signature() {
    let (server, oauth, _resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(TokenKind::AccessToken, &alice_access_claims(), Duration::hours(1))
        .unwrap();

    let sig_start = token.rfind('.').unwrap() + 1;
    for offset in [sig_start, sig_start + 5, token.len() - 2] {
        let mut bytes = token.clone().into_bytes();
        bytes[offset] = if bytes[offset] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        let (name, value) = bearer(&tampered);

        let response = server.get("/userinfo").add_header(name, value).await;

        assert_invalid_token(&response);
    }
}

#[tokio::test]
async fn test_userinfo_rejects_altered_payload() {
    let (server, oauth, _resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(TokenKind::AccessToken, &alice_access_claims(), Duration::hours(1))
        .unwrap();
    let mut bob = alice_access_claims();
    bob.sub = BOB_ID.into();
    let forged_source = oauth
        .codec
        .issue(TokenKind::AccessToken, &bob, Duration::hours(1))
        .unwrap();

    // Bob's payload under Alice's signature
    let alice_parts: Vec<&str> = token.split('.').collect();
    let bob_parts: Vec<&str> = forged_source.split('.').collect();
    let spliced = format!("{}.{}.{}", alice_parts[0], bob_parts[1], alice_parts[2]);
    let (name, value) = bearer(&spliced);

    let response = server.get("/userinfo").add_header(name, value).await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_rejects_expired_token() {
    let (server, oauth, _resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue_at(
            TokenKind::AccessToken,
            &alice_access_claims(),
            Duration::hours(1),
            OffsetDateTime::now_utc() - Duration::hours(2),
        )
        .unwrap();
    let (name, value) = bearer(&token);

    let response = server.get("/userinfo").add_header(name, value).await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_rejects_refresh_token() {
    let (server, oauth, _resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(
            TokenKind::RefreshToken,
            &RefreshTokenClaims {
                sub: ALICE_ID.into(),
                client_id: CLIENT_ID.into(),
            },
            Duration::days(7),
        )
        .unwrap();
    let (name, value) = bearer(&token);

    let response = server.get("/userinfo").add_header(name, value).await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_rejects_deleted_user() {
    let (server, oauth, resources) = create_test_server(true).await;
    let token = oauth
        .codec
        .issue(TokenKind::AccessToken, &alice_access_claims(), Duration::hours(1))
        .unwrap();

    for sql in [
        "DELETE FROM user_session WHERE user_id = 'user-alice';",
        "DELETE FROM user_account WHERE id = 'user-alice';",
    ] {
        resources
            .db
            .execute(Statement::from_string(DbBackend::Sqlite, sql))
            .await
            .expect("delete user");
    }

    let (name, value) = bearer(&token);
    let response = server.get("/userinfo").add_header(name, value).await;

    assert_invalid_token(&response);
}

#[tokio::test]
async fn test_userinfo_with_token_from_exchange() {
    let (server, _oauth, _resources) = create_test_server(true).await;
    let code = authorize_code(&server, None).await;
    let issued: TokenResponse = server
        .post("/token")
        .form(&code_exchange_form(&code))
        .await
        .json();
    let (name, value) = bearer(&issued.access_token);

    let response = server.get("/userinfo").add_header(name, value).await;

    response.assert_status_ok();
    let body: UserInfoResponse = response.json();
    assert_eq!(body.id, ALICE_ID);
}
