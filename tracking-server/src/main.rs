use std::net::SocketAddr;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tracking_server::backend::{BackendClient, BackendConfig};
use tracking_server::directions::{DirectionsClient, DirectionsConfig};
use tracking_server::route::{CachedDirections, RouteCacheConfig, RouteFetcherConfig};
use tracking_server::tracking::TrackingConfig;
use tracking_server::web::{AppState, create_router};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080/api";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("DIRECTIONS_API_KEY").unwrap_or_else(|_| {
        warn!("DIRECTIONS_API_KEY not set; route lookups will fail");
        String::new()
    });
    let mut directions_config = DirectionsConfig::new(api_key);
    if let Ok(url) = std::env::var("DIRECTIONS_BASE_URL") {
        directions_config = directions_config.with_base_url(url);
    }
    let directions = DirectionsClient::new(directions_config)?;
    let directions = CachedDirections::new(directions, &RouteCacheConfig::default());

    let backend_url = std::env::var("BACKEND_URL").unwrap_or_else(|_| {
        warn!(default = DEFAULT_BACKEND_URL, "BACKEND_URL not set; using default");
        DEFAULT_BACKEND_URL.to_string()
    });
    let mut backend_config = BackendConfig::new(backend_url);
    match std::env::var("BACKEND_TOKEN") {
        Ok(token) => backend_config = backend_config.with_token(token),
        Err(_) => warn!("BACKEND_TOKEN not set; backend requests are unauthenticated"),
    }
    let backend = BackendClient::new(backend_config)?;

    let state = AppState::new(
        directions,
        backend,
        RouteFetcherConfig::default(),
        TrackingConfig::default(),
    );
    let app = create_router(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "tracking server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
