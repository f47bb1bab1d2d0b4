pub mod clear_sessions;
pub mod create_user;
pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;

pub use clear_sessions::clear_sessions;
pub use create_user::{create_user, NewUser};
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;

use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

use crate::config::Settings;

/// Settings from every source, with the command line database URL on top.
pub(crate) fn load_settings(database_url: Option<String>) -> Result<Settings> {
    let settings = Settings::load()?;
    Ok(match database_url {
        Some(url) => settings.with_database_url(&url),
        None => settings,
    })
}

pub(crate) async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Attempting to connect to database");
    match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            debug!("Database connection established");
            Ok(connection)
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            Err(e.into())
        }
    }
}

pub(crate) async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    info!("Running database migrations");
    trace!("Executing migration up command");
    match Migrator::up(db, None).await {
        Ok(_) => {
            info!("Database migrations completed successfully");
            debug!("All pending migrations have been applied");
            Ok(())
        }
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            Err(e.into())
        }
    }
}
