//! Signing and verification of every bearer artifact the server hands out.
//!
//! Authorization codes, access tokens and refresh tokens are all HS256 JWTs signed with
//! one process-wide secret. Each carries a `token_use` claim so an artifact of one kind
//! is never accepted where another is expected.

use crate::config::MIN_SIGNING_SECRET_LEN;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("signing secret must be at least {MIN_SIGNING_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("failed to encode token: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "code")]
    AuthorizationCode,
    #[serde(rename = "access")]
    AccessToken,
    #[serde(rename = "refresh")]
    RefreshToken,
}

/// Claims of an authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeClaims {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub client_id: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope<C> {
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
    token_use: TokenKind,
    #[serde(flatten)]
    claims: C,
}

/// Claims of a token that passed signature, expiry and kind checks.
#[derive(Debug, Clone)]
pub struct Verified<C> {
    pub claims: C,
    pub jti: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<Keys>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.inner.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Result<Self, CodecError> {
        if secret.len() < MIN_SIGNING_SECRET_LEN {
            return Err(CodecError::WeakSecret);
        }
        Ok(Self {
            inner: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                issuer: issuer.into(),
            }),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.inner.issuer
    }

    pub fn issue<C: Serialize>(
        &self,
        kind: TokenKind,
        claims: &C,
        ttl: Duration,
    ) -> Result<String, CodecError> {
        self.issue_at(kind, claims, ttl, OffsetDateTime::now_utc())
    }

    /// Sign `claims` as if issued at `issued_at`.
    pub fn issue_at<C: Serialize>(
        &self,
        kind: TokenKind,
        claims: &C,
        ttl: Duration,
        issued_at: OffsetDateTime,
    ) -> Result<String, CodecError> {
        let envelope = Envelope {
            iss: self.inner.issuer.clone(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + ttl).unix_timestamp(),
            jti: uuid::Uuid::new_v4().simple().to_string(),
            token_use: kind,
            claims,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &envelope,
            &self.inner.encoding,
        )
        .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    /// Check signature, issuer, expiry and kind. Expiry has zero leeway.
    pub fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Verified<C>, CodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_issuer(&[self.inner.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = decode::<Envelope<C>>(token, &self.inner.decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Invalid,
            },
        )?;
        let envelope = data.claims;
        if envelope.token_use != kind {
            return Err(CodecError::Invalid);
        }

        let issued_at =
            OffsetDateTime::from_unix_timestamp(envelope.iat).map_err(|_| CodecError::Invalid)?;
        let expires_at =
            OffsetDateTime::from_unix_timestamp(envelope.exp).map_err(|_| CodecError::Invalid)?;
        if expires_at <= OffsetDateTime::now_utc() {
            return Err(CodecError::Expired);
        }

        Ok(Verified {
            claims: envelope.claims,
            jti: envelope.jti,
            issued_at,
            expires_at,
        })
    }
}
