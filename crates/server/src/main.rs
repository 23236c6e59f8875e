use color_eyre::eyre::WrapErr;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use sso_server::AppResources;
use sso_server::api::start_webserver;
use sso_server::config::load_config;
use sso_server::oauth2::OAuth2State;
use sso_server::store::seed::seed_demo_data;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "sso_server=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = Arc::new(load_config().wrap_err("failed to load configuration")?);
    tracing::info!(
        public_url = %config.public_url,
        bind_addr = %config.bind_addr,
        single_use_codes = config.oauth2.single_use_codes,
        "configuration loaded"
    );

    // Set up SeaORM database connection
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("failed to connect to database")?,
    );
    Migrator::up(db.as_ref(), None)
        .await
        .wrap_err("failed to apply migrations")?;
    if config.seed_demo_data {
        seed_demo_data(db.as_ref())
            .await
            .wrap_err("failed to seed demo data")?;
    }

    let oauth = OAuth2State::from_db(db.clone(), &config)
        .wrap_err("failed to initialise token signing")?;

    let resources = AppResources { db, config };
    start_webserver(oauth, resources).await?;
    Ok(())
}
