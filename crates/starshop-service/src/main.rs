//! Starshop Service - order desk and HTTP event API
//!
//! This is the main entry point for the starshop service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starshop_service::{create_router, AppState, Collaborators, ServiceConfig};
use starshop_store::FileStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,starshop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting starshop service");

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        admins = config.admin_ids.len(),
        fulfillment = ?config.fulfillment_mode,
        cryptopay_configured = %config.cryptopay_api_token.is_some(),
        subscription_channel = ?config.subscription_channel,
        "Service configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening document store");
    let store = Arc::new(FileStore::open(&config.data_dir)?);

    let collaborators = Collaborators::from_config(&config);
    let state = AppState::new(store, config.clone(), collaborators);

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
