use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use super::load_settings;
use crate::config::{initialize_app_state, Settings};
use crate::router::create_router_with_metrics;

pub async fn serve(database_url: Option<String>, bind_address: Option<String>) -> Result<()> {
    trace!("Entering serve function");
    info!("Newsroom application starting up");

    let mut settings = load_settings(database_url)?;
    if let Some(bind_address) = bind_address {
        settings.bind_address = bind_address;
    }
    run_server(settings).await
}

/// Build the state and router from `settings` and serve until shutdown.
pub(crate) async fn run_server(settings: Settings) -> Result<()> {
    debug!("Database URL: {}", settings.database_url);
    debug!("Bind address: {}", settings.bind_address);
    let bind_address = settings.bind_address.clone();

    // Initialize application state
    trace!("Initializing application state");
    let state = match initialize_app_state(settings).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    // Create router
    trace!("Creating application router");
    let app = create_router_with_metrics(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    trace!("Attempting to bind TCP listener to {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("Newsroom running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);
    debug!("Server is ready to accept connections");

    trace!("Starting axum server");
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
