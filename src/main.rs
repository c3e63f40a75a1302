//! Layanan Desa
//!
//! Backend for village administrative services.
//!
//! ## Features
//!
//! - **Surat**: residents request letters and follow them by tracking code;
//!   village staff process, approve (assigning the official letter number),
//!   reject and complete them
//! - **Penduduk**: resident registry
//! - **Staff**: accounts with `admin` and `perangkat_desa` roles, JWT login

mod config;
mod db;
mod handlers;
mod models;
mod surat;
mod validation;

use handlers::{AppState, JwtKeys};
use std::net::SocketAddr;
use std::sync::Arc;
use surat::{RandomIdentifierGenerator, SuratWorkflow, SystemClock};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "layanan_desa=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Layanan Desa");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    if let Some(ref admin) = config.bootstrap_admin {
        handlers::ensure_bootstrap_admin(&pool, admin).await?;
    }

    let workflow = SuratWorkflow::new(
        Arc::new(db::PgSuratRepository::new(pool.clone())),
        Arc::new(SystemClock),
        Arc::new(RandomIdentifierGenerator),
    );

    // Create application state
    let state = AppState {
        pool,
        workflow: Arc::new(workflow),
        jwt: Arc::new(JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours)),
        is_production: config.is_production(),
        trusted_proxies: config.trusted_proxies.clone(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let app = handlers::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
