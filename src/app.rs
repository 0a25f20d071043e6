use crate::admin_handler;
use crate::handlers::{self, AppState};
use crate::upload_handler;
use crate::webhook_handler;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Upper bound for any request body; leaves room for multipart framing around
/// the largest accepted receipt.
pub const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

/// Per-IP rate limit applied to every route except `/health`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_second: 10,
            burst_size: 20,
        }
    }
}

/// Builds the HTTP application.
///
/// # Arguments
///
/// * `state` - Shared application state.
/// * `rate_limit` - `None` disables the limiter (tests drive the router without
///   a peer address, which the IP key extractor needs).
pub fn build_router(state: Arc<AppState>, rate_limit: Option<RateLimit>) -> anyhow::Result<Router> {
    let mut api_routes = Router::new()
        .route("/payment", post(handlers::create_payment))
        .route("/payment/status", get(handlers::payment_status))
        .route("/leads/save", post(handlers::save_lead))
        .route("/:gateway/webhook", post(webhook_handler::gateway_webhook))
        .route(
            "/comprovantes/upload",
            post(upload_handler::upload_receipt).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/comprovantes/list", get(admin_handler::list_receipts))
        .route("/comprovantes/export", get(admin_handler::export_receipts))
        .route("/qr", get(handlers::qr_proxy))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    if let Some(limit) = rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst_size)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        api_routes = api_routes.layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        }));
    }

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}
