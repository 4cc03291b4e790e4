//! Shared application state for the Axum server.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ibn_commit::{CommitEngine, CommitRegistry, SystemClock};
use ibn_controller::{ControllerConfig, IntentProcessor};
use ibn_protocol::{Device, ProcessResponse};
use ibn_transport::DeviceConnector;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared application state, cheap to clone into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Registered inventory, keyed by device id.
    pub devices: Arc<RwLock<BTreeMap<String, Device>>>,
    /// Every processed intent, oldest first.
    pub intents: Arc<RwLock<Vec<IntentRecord>>>,
    pub processor: IntentProcessor,
    pub engine: CommitEngine,
    /// Used for post-deployment telemetry queries.
    pub connector: Arc<dyn DeviceConnector>,
}

/// A processed intent and its pipeline output.
#[derive(Debug, Clone, Serialize)]
pub struct IntentRecord {
    pub id: Uuid,
    pub intent: String,
    pub created_at: DateTime<Utc>,
    pub response: ProcessResponse,
}

impl AppState {
    pub fn new(
        processor: IntentProcessor,
        engine: CommitEngine,
        connector: Arc<dyn DeviceConnector>,
    ) -> Self {
        Self {
            devices: Arc::new(RwLock::new(BTreeMap::new())),
            intents: Arc::new(RwLock::new(Vec::new())),
            processor,
            engine,
            connector,
        }
    }

    /// Processor and engine wired from one controller config, sharing
    /// `connector`. Commit expiry uses the wall clock.
    pub fn from_config(
        config: &ControllerConfig,
        connector: Arc<dyn DeviceConnector>,
    ) -> anyhow::Result<Self> {
        let processor = IntentProcessor::from_config(config, Arc::clone(&connector))?;
        let registry = Arc::new(CommitRegistry::new(Arc::new(SystemClock)));
        let engine = CommitEngine::new(Arc::clone(&connector), registry, config.commit.clone());
        Ok(Self::new(processor, engine, connector))
    }

    /// Add devices to the inventory (replacing same-id entries) and make
    /// them reachable by the commit engine.
    pub async fn register_devices(&self, devices: &[Device]) {
        let mut known = self.devices.write().await;
        for device in devices {
            known.insert(device.device_id.clone(), device.clone());
        }
        self.engine.register_devices(devices);
    }

    pub async fn inventory(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn intent(&self, id: Uuid) -> Option<IntentRecord> {
        self.intents
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}
