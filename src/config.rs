use std::sync::Arc;

use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use sea_orm::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::mail::{ConsoleBackend, EmailBackend};
use crate::schemas::AppState;
use crate::templates::load_templates;

/// Name of the optional configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "newsroom";

/// Secret used when nothing else is configured. Never deploy with it.
pub const DEV_SECRET_KEY: &str = "newsroom-insecure-development-secret-key";

/// Runtime settings, layered as defaults, then `newsroom.toml`, then environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    /// Keys the password reset token MAC.
    pub secret_key: String,
    /// Absolute base used for links in outgoing mail.
    pub site_url: String,
    pub session_age_secs: i64,
    pub password_reset_timeout_secs: i64,
    pub default_from_email: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://newsroom.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            secret_key: DEV_SECRET_KEY.to_string(),
            site_url: "http://localhost:3000".to_string(),
            session_age_secs: 60 * 60 * 24 * 7 * 2,
            password_reset_timeout_secs: 60 * 60 * 24 * 3,
            default_from_email: "webmaster@localhost".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from every source.
    pub fn load() -> Result<Self> {
        trace!("Loading settings");
        dotenvy::dotenv().ok();

        let settings: Settings = Self::builder()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.secret_key == DEV_SECRET_KEY {
            warn!("SECRET_KEY is not set, using the development secret");
        }
        debug!("Settings loaded, database URL: {}", settings.database_url);
        Ok(settings)
    }

    /// Builder seeded with the defaults, for adding further sources.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder().add_source(Config::try_from(&Settings::default())?))
    }

    /// Host part of `site_url`, used as the site name in mail.
    pub fn site_domain(&self) -> &str {
        let without_scheme = self
            .site_url
            .split_once("://")
            .map_or(self.site_url.as_str(), |(_, rest)| rest);
        without_scheme.trim_end_matches('/')
    }

    pub fn with_database_url(mut self, database_url: &str) -> Self {
        self.database_url = database_url.to_string();
        self
    }
}

/// Connect to the database and assemble the state shared by all handlers.
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url).await?;

    let templates = load_templates()?;
    let mailer: Arc<dyn EmailBackend> = Arc::new(ConsoleBackend);

    Ok(AppState {
        db,
        templates: Arc::new(templates),
        mailer,
        settings: Arc::new(settings),
    })
}
