mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mesh_api::AppStateInner;
use mesh_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesh=debug,mesh_api=debug,mesh_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;

    // Init database
    let db = mesh_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let state = AppStateInner::new(db, config.jwt_secret, Arc::new(dispatcher));

    let app = mesh_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Meshspace server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
