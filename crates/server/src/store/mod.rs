//! Repository interfaces consumed by the protocol core.
//!
//! The core never touches the database directly: it talks to a [`ClientRegistry`],
//! a [`UserStore`] and a [`SessionStore`] injected at construction. [`db::SeaOrmStore`]
//! implements all three on top of SeaORM.

pub mod db;
pub mod seed;

use crate::entity::{application, session, user};
use crate::error::StoreError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub use db::SeaOrmStore;

pub type Application = application::Model;
pub type User = user::Model;
pub type Session = session::Model;

/// Random bytes in a generated `client_id`.
pub const CLIENT_ID_BYTES: usize = 16;
/// Random bytes in a generated `client_secret`.
pub const CLIENT_SECRET_BYTES: usize = 32;

/// Fields of an application about to be persisted.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

/// Registered client applications.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Find an application by its public client identifier.
    async fn lookup(&self, client_id: &str) -> Result<Application, StoreError>;

    /// Persist an application. Fails with `Conflict` when `client_id` is taken.
    async fn insert(&self, new: NewApplication) -> Result<Application, StoreError>;

    /// Delete an application by its opaque id.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<Application>, StoreError>;

    /// Register a new application with freshly generated credentials.
    async fn create(
        &self,
        name: &str,
        redirect_uris: Vec<String>,
    ) -> Result<Application, StoreError> {
        let new = prepare_application(name, redirect_uris)?;
        let app = self.insert(new).await?;
        tracing::info!(id = %app.id, client_id = %app.client_id, "application registered");
        Ok(app)
    }
}

/// Read-only access to user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
}

/// Login sessions owned by the external login component.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve the value of a session cookie.
    async fn find_by_token(&self, session_token: &str) -> Result<Option<Session>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Validate registration input and mint credentials.
pub fn prepare_application(
    name: &str,
    redirect_uris: Vec<String>,
) -> Result<NewApplication, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::InvalidInput("name is required".into()));
    }
    if redirect_uris.is_empty() {
        return Err(StoreError::InvalidInput(
            "at least one redirect URI is required".into(),
        ));
    }

    let mut uris: Vec<String> = Vec::with_capacity(redirect_uris.len());
    for uri in redirect_uris {
        if uri.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "redirect URIs must not be blank".into(),
            ));
        }
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }

    Ok(NewApplication {
        name: name.to_string(),
        client_id: random_hex(CLIENT_ID_BYTES)?,
        client_secret: random_hex(CLIENT_SECRET_BYTES)?,
        redirect_uris: uris,
    })
}

/// Hex-encode `len` bytes from the operating system's CSPRNG.
pub fn random_hex(len: usize) -> Result<String, StoreError> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes)
        .map_err(|e| StoreError::RandomSource(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Bound a store future by `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_have_expected_shape() {
        let new = prepare_application("App", vec!["https://a.test/cb".into()]).unwrap();
        assert_eq!(new.client_id.len(), CLIENT_ID_BYTES * 2);
        assert_eq!(new.client_secret.len(), CLIENT_SECRET_BYTES * 2);
        assert!(new.client_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(new.client_secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn credentials_are_unique() {
        let a = prepare_application("App", vec!["https://a.test/cb".into()]).unwrap();
        let b = prepare_application("App", vec!["https://a.test/cb".into()]).unwrap();
        assert_ne!(a.client_id, b.client_id);
        assert_ne!(a.client_secret, b.client_secret);
    }

    #[test]
    fn empty_name_is_invalid() {
        let err = prepare_application("   ", vec!["https://a.test/cb".into()]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn empty_redirect_uris_are_invalid() {
        let err = prepare_application("App", vec![]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err = prepare_application("App", vec![" ".into()]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn duplicate_redirect_uris_collapse_in_order() {
        let new = prepare_application(
            " App ",
            vec![
                "https://b.test/cb".into(),
                "https://a.test/cb".into(),
                "https://b.test/cb".into(),
            ],
        )
        .unwrap();
        assert_eq!(new.name, "App");
        assert_eq!(
            new.redirect_uris,
            vec!["https://b.test/cb".to_string(), "https://a.test/cb".to_string()]
        );
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let result: Result<(), StoreError> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn bounded_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
