use pix_checkout_api::app::{build_router, RateLimit};
use pix_checkout_api::config::Config;
use pix_checkout_api::db::Database;
use pix_checkout_api::handlers::AppState;
use pix_checkout_api::storage::{PgStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and migrations (when a database is configured).
/// - Gateway adapters and outbound clients.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pix_checkout_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Database is optional: without it the checkout still works, leads are skipped
    let store: Option<Arc<dyn Store>> = match config.database_url {
        Some(ref url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            db.migrate().await?;
            Some(Arc::new(PgStore::new(db.pool)) as Arc<dyn Store>)
        }
        None => None,
    };

    let app_state = Arc::new(AppState::from_config(config.clone(), store)?);
    tracing::info!(
        "✓ Gateway '{}' ready ({})",
        config.payment_gateway,
        match app_state.gateways.active().ensure_configured() {
            Ok(()) => "configured".to_string(),
            Err(e) => format!("not configured: {}", e),
        }
    );

    // Rate limiting: 10 req/sec per IP, burst of 20
    let app = build_router(app_state, Some(RateLimit::default()))?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
