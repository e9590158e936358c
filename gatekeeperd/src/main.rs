mod allocator;
mod api;
mod assignment;
mod config;
mod error;
mod registry;
mod resolver;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use shared::protocol::ENV_CONFIG_PATH;
use crate::assignment::{Assigner, AssignmentHandle};
use crate::config::Config;
use crate::registry::netbox::NetBoxClient;
use crate::registry::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gatekeeperd=info"))
        )
        .init();

    tracing::info!("Starting gatekeeperd");

    // Config file is optional; environment alone is enough
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
        .map(PathBuf::from);

    let config = Config::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    match &config_path {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("Loaded config from environment"),
    }
    tracing::debug!("{:?}", config);

    // One registry client for the life of the process
    let registry: Arc<dyn Registry> = Arc::new(
        NetBoxClient::new(&config.registry, &config.provisioning.port_field, &config.provisioning.mac_field)
            .context("Failed to create registry client")?,
    );

    let registry_ready = match registry.ping().await {
        Ok(()) => {
            tracing::info!("Connected to registry at {}", config.registry.url);
            true
        }
        Err(e) => {
            tracing::error!("Failed to connect to registry: {}", e);
            false
        }
    };

    tracing::info!(
        "Allocating ports from {} into custom field {}",
        config.provisioning.port_floor,
        config.provisioning.port_field
    );
    let assignments = AssignmentHandle::spawn(Assigner::new(
        registry.clone(),
        config.provisioning.clone(),
    ));

    let app_state = api::routes::AppState {
        assignments: assignments.clone(),
        registry,
        registry_ready: Arc::new(AtomicBool::new(registry_ready)),
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();
    let _ = server_handle.await;

    // In-flight allocations finish before the task exits
    if let Err(e) = assignments.shutdown().await {
        tracing::error!("Failed to stop allocation task: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
