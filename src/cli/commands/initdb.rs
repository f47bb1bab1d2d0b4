use anyhow::Result;
use tracing::{debug, info, trace};

use super::{connect, load_settings, run_migrations};

pub async fn init_database(database_url: Option<String>) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");

    let settings = load_settings(database_url)?;
    debug!("Database URL: {}", settings.database_url);

    let db = connect(&settings.database_url).await?;
    run_migrations(&db).await?;

    info!("Database initialization completed successfully!");
    trace!("init_database function completed");

    Ok(())
}
