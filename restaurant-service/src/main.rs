use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common_auth::{JwtConfig, TokenVerifier};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;

use restaurant_service::config::load_service_config;
use restaurant_service::metrics::ServiceMetrics;
use restaurant_service::pg_store::PgDocumentStore;
use restaurant_service::tokens::{TokenConfig, TokenSigner};
use restaurant_service::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_service_config()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let store = PgDocumentStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("Failed to prepare document schema")?;

    let jwt_config =
        JwtConfig::new(config.secret_key.clone()).with_leeway(config.token_leeway_seconds);
    let verifier = Arc::new(TokenVerifier::new(jwt_config));

    let signer = Arc::new(TokenSigner::new(TokenConfig {
        secret: config.secret_key.clone(),
        access_ttl_seconds: config.access_ttl_seconds,
        refresh_ttl_seconds: config.refresh_ttl_seconds,
    })?);

    let metrics = Arc::new(ServiceMetrics::new()?);

    let state = AppState::new(Arc::new(store), verifier, signer, metrics);
    let app = build_router(state);

    let ip: std::net::IpAddr = config.host.parse().context("Invalid HOST address")?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting restaurant-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
