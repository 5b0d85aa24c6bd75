//! Roost API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Property / unit / bedroom inventory
//! - Tenant directory and reassignment
//! - Lease lifecycle (create, activate, rent corrections, delete)
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use roost_common::{
    config::AppConfig,
    db::DbPool,
    metrics,
    occupancy::OccupancyService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub occupancy: OccupancyService,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Roost API Gateway v{}", roost_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from((
                [0, 0, 0, 0],
                config.observability.metrics_port,
            )))
            .install()?;
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Create app state
    let occupancy = OccupancyService::new(db.clone(), config.billing.clone());
    let state = AppState {
        config: config.clone(),
        db,
        occupancy,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Property endpoints
        .route("/properties", post(handlers::properties::create_property))
        .route("/properties", get(handlers::properties::list_properties))
        .route("/properties/{id}", get(handlers::properties::get_property))
        .route("/properties/{id}", delete(handlers::properties::delete_property))
        .route("/properties/{id}/units", post(handlers::units::create_unit))
        .route("/properties/{id}/units", get(handlers::units::list_units))

        // Unit and bedroom endpoints
        .route("/units/{id}", get(handlers::units::get_unit))
        .route("/units/{id}/bedrooms", post(handlers::units::create_bedroom))
        .route("/units/{id}/bedrooms", get(handlers::units::list_bedrooms))
        .route("/units/{id}/leases", get(handlers::leases::list_unit_leases))

        // Tenant endpoints
        .route("/tenants", post(handlers::tenants::create_tenant))
        .route("/tenants/{id}", get(handlers::tenants::get_tenant))
        .route("/tenants/{id}/move", post(handlers::tenants::move_tenant))
        .route("/tenants/{id}/leases", get(handlers::tenants::list_tenant_leases))
        .route("/tenants/{id}/invoices", get(handlers::tenants::list_tenant_invoices))

        // Lease lifecycle endpoints
        .route("/leases", post(handlers::leases::create_lease))
        .route("/leases/{id}", get(handlers::leases::get_lease))
        .route("/leases/{id}", delete(handlers::leases::delete_lease))
        .route("/leases/{id}/activate", post(handlers::leases::activate_lease))
        .route("/leases/{id}/rent", put(handlers::leases::update_rent))
        .route("/leases/{id}/invoices", get(handlers::leases::list_lease_invoices));

    // Global rate limit
    let rate_limit = &state.config.rate_limit;
    let limiter_layer = if rate_limit.enabled {
        let limit = rate_limit.requests_per_second;
        let limiter =
            middleware::rate_limit::create_rate_limiter(limit, rate_limit.burst);
        Some(axum::middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter, limit).await
            }
        }))
    } else {
        None
    };

    // Compose the app
    let mut app = Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if let Some(layer) = limiter_layer {
        app = app.layer(layer);
    }

    app.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
