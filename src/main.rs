use std::sync::Arc;

use gymkeeper::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use gymkeeper::store::PostgresStore;
use tracing::info;

/// Bootstrap: prepares the database so the service crates that embed the
/// core can start serving. Runs migrations and seeds the zone catalogue
/// and the locker bank.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let app_config = AppConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    info!(environment = %app_config.environment, "gymkeeper bootstrap starting");

    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;
    info!("Migrations applied");

    let store = Arc::new(PostgresStore::new(pool));
    DatabaseSeeder::new(store).seed_all().await?;

    info!("Bootstrap complete");
    Ok(())
}
