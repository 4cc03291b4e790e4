//! Intent controller CLI.
//!
//! Usage: `ibn-controller <config.toml> <inventory.json> "<intent text>" [policy.json]`
//!
//! Runs the intent pipeline once and prints the response JSON to stdout.

use std::sync::Arc;

use ibn_controller::{ControllerConfig, IntentProcessor};
use ibn_protocol::{ChangePolicy, Device, IntentRequest};
use ibn_transport::LiveConnector;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ibn-controller starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, inventory_path, intent, rest @ ..] = args.as_slice() else {
        anyhow::bail!(
            "usage: ibn-controller <config.toml> <inventory.json> \"<intent text>\" [policy.json]"
        );
    };

    // ── Inputs ──────────────────────────────────────────────────
    let config = ControllerConfig::from_file(config_path)?;
    let inventory: Vec<Device> =
        serde_json::from_str(&std::fs::read_to_string(inventory_path)?)?;
    let policy: ChangePolicy = match rest.first() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ChangePolicy::default(),
    };
    tracing::info!(
        devices = inventory.len(),
        cache_dir = %config.cache_dir.display(),
        "inputs loaded"
    );

    // ── Pipeline ────────────────────────────────────────────────
    let connector = Arc::new(LiveConnector::new(config.transport.clone()));
    let processor = IntentProcessor::from_config(&config, connector)?;

    let response = processor
        .process(IntentRequest {
            intent: intent.clone(),
            inventory,
            policy,
            telemetry_hint: None,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
