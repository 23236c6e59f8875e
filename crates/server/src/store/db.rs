//! SeaORM-backed implementation of the repository traits.

use super::{
    Application, ClientRegistry, NewApplication, Session, SessionStore, User, UserStore, bounded,
};
use crate::entity::{application, session, user};
use crate::error::StoreError;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, SqlErr,
};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// One handle serving every repository trait.
#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
    timeout: Duration,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

fn map_insert_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => StoreError::Conflict(msg),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl ClientRegistry for SeaOrmStore {
    #[tracing::instrument(skip(self))]
    async fn lookup(&self, client_id: &str) -> Result<Application, StoreError> {
        bounded(self.timeout, async {
            application::Entity::find()
                .filter(application::Column::ClientId.eq(client_id))
                .one(self.db.as_ref())
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    async fn insert(&self, new: NewApplication) -> Result<Application, StoreError> {
        bounded(self.timeout, async {
            let redirect_uris = serde_json::to_string(&new.redirect_uris)
                .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
            let now = OffsetDateTime::now_utc();
            let model = application::ActiveModel {
                id: Set(uuid::Uuid::new_v4().to_string()),
                name: Set(new.name),
                client_id: Set(new.client_id),
                client_secret: Set(new.client_secret),
                redirect_uris: Set(redirect_uris),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model.insert(self.db.as_ref()).await.map_err(map_insert_err)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            let result = application::Entity::delete_by_id(id.to_string())
                .exec(self.db.as_ref())
                .await?;
            if result.rows_affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Application>, StoreError> {
        bounded(self.timeout, async {
            Ok(application::Entity::find()
                .order_by_asc(application::Column::CreatedAt)
                .all(self.db.as_ref())
                .await?)
        })
        .await
    }
}

#[async_trait]
impl UserStore for SeaOrmStore {
    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        bounded(self.timeout, async {
            Ok(user::Entity::find_by_id(id.to_string())
                .one(self.db.as_ref())
                .await?)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SeaOrmStore {
    #[tracing::instrument(skip_all)]
    async fn find_by_token(&self, session_token: &str) -> Result<Option<Session>, StoreError> {
        bounded(self.timeout, async {
            Ok(session::Entity::find()
                .filter(session::Column::SessionToken.eq(session_token))
                .one(self.db.as_ref())
                .await?)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        bounded(self.timeout, async {
            Ok(session::Entity::find_by_id(id.to_string())
                .one(self.db.as_ref())
                .await?)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        bounded(self.timeout, async {
            Ok(session::Entity::find()
                .filter(session::Column::UserId.eq(user_id))
                .order_by_desc(session::Column::Expires)
                .all(self.db.as_ref())
                .await?)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            let result = session::Entity::delete_by_id(id.to_string())
                .exec(self.db.as_ref())
                .await?;
            if result.rows_affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }
}
