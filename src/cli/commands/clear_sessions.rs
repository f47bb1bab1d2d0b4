use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, trace};

use super::{connect, load_settings};
use crate::auth::session::clear_expired;

/// Remove sessions past their expiry date.
pub async fn clear_sessions(database_url: Option<String>) -> Result<()> {
    trace!("Entering clear_sessions function");
    let settings = load_settings(database_url)?;
    let db = connect(&settings.database_url).await?;

    match clear_expired(&db, Utc::now()).await {
        Ok(removed) => {
            info!("Removed {} expired session(s)", removed);
            Ok(())
        }
        Err(e) => {
            error!("Failed to clear expired sessions: {}", e);
            Err(e.into())
        }
    }
}
