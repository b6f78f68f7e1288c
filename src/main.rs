// Initialize configuration
// Set up logging
// Create database connection pool
// Create shared state and services
// Start the scheduler
// Start HTTP server

use balance_watch::{api, blockchain, db, AppState, Config, RpcAdapter, Services};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting balance-watch");

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    // Setup database connection
    let db_pool = db::connection::establish_connection(&config.database_url).await?;

    // Create shared state
    let adapter = Arc::new(RpcAdapter::new(config.rpc_timeout())?);
    let state = Arc::new(AppState::new(config.clone(), db_pool, adapter).await?);
    let services = Arc::new(Services::new(state).await?);

    // Start the scheduler
    let shutdown = CancellationToken::new();
    let polling_services = services.clone();
    let polling_shutdown = shutdown.clone();
    let polling = tokio::spawn(async move {
        blockchain::polling::start_polling(polling_services, polling_shutdown).await;
    });
    tracing::info!("Scheduler task started");

    // Start HTTP server
    let app = api::create_router(services);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Starting server on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = polling.await;
    tracing::info!("Stopped");
    Ok(())
}
