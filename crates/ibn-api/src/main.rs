//! Intent controller REST API server.
//!
//! Serves intent submission, inventory and deployment endpoints backed by
//! live NETCONF/gNMI/RESTCONF connections.

use std::sync::Arc;

use ibn_api::{ApiConfig, AppState, build_router};
use ibn_controller::ControllerConfig;
use ibn_transport::LiveConnector;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ibn-api starting");

    let api_config = ApiConfig::from_env();
    let controller_config = match &api_config.controller_config {
        Some(path) => {
            tracing::info!(path = %path, "loading controller config");
            ControllerConfig::from_file(path)?
        }
        None => {
            tracing::warn!("IBN_CONFIG not set, using built-in controller defaults");
            ControllerConfig::default()
        }
    };

    let connector = Arc::new(LiveConnector::new(controller_config.transport.clone()));
    let state = AppState::from_config(&controller_config, connector)?;

    let _sweeper = state
        .engine
        .spawn_expiry_sweeper(controller_config.commit.sweep_interval());

    let app = build_router(state);

    let addr = format!("{}:{}", api_config.host, api_config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
