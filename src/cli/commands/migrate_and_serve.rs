use anyhow::Result;
use tracing::{debug, info, trace};

use super::serve::run_server;
use super::{connect, load_settings, run_migrations};

pub async fn migrate_and_serve(database_url: Option<String>, bind_address: Option<String>) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    let mut settings = load_settings(database_url)?;
    if let Some(bind_address) = bind_address {
        settings.bind_address = bind_address;
    }
    debug!("Database URL: {}", settings.database_url);

    // Apply migrations
    let db = connect(&settings.database_url).await?;
    run_migrations(&db).await?;
    drop(db);

    run_server(settings).await
}
