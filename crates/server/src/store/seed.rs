//! Demo records for a fresh deployment: one admin account and the `example-client`
//! application. Running it again leaves existing rows untouched.

use crate::entity::{application, user};
use crate::error::StoreError;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use time::OffsetDateTime;

pub const DEMO_ADMIN_ID: &str = "demo-admin";
pub const DEMO_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEMO_CLIENT_ID: &str = "example-client";
pub const DEMO_CLIENT_SECRET: &str = "example-secret";
pub const DEMO_REDIRECT_URI: &str = "http://localhost:3001/callback";

/// Which demo records were written by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedOutcome {
    pub admin_created: bool,
    pub application_created: bool,
}

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<SeedOutcome, StoreError> {
    let mut outcome = SeedOutcome::default();
    let now = OffsetDateTime::now_utc();

    let admin = user::Entity::find()
        .filter(user::Column::Email.eq(DEMO_ADMIN_EMAIL))
        .one(db)
        .await?;
    if admin.is_none() {
        user::ActiveModel {
            id: Set(DEMO_ADMIN_ID.to_string()),
            email: Set(DEMO_ADMIN_EMAIL.to_string()),
            name: Set(Some("Admin User".to_string())),
            image: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await?;
        outcome.admin_created = true;
    }

    let app = application::Entity::find()
        .filter(application::Column::ClientId.eq(DEMO_CLIENT_ID))
        .one(db)
        .await?;
    if app.is_none() {
        let redirect_uris = serde_json::to_string(&[DEMO_REDIRECT_URI])
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        application::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set("Example Application".to_string()),
            client_id: Set(DEMO_CLIENT_ID.to_string()),
            client_secret: Set(DEMO_CLIENT_SECRET.to_string()),
            redirect_uris: Set(redirect_uris),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        outcome.application_created = true;
    }

    tracing::info!(
        admin_created = outcome.admin_created,
        application_created = outcome.application_created,
        "demo data seeded"
    );
    Ok(outcome)
}
