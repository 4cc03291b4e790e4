//! Shared test harness for E2E integration tests.
//!
//! Wires the intent processor, commit engine and HTTP router to one
//! `MockConnector`, one model cache and one manual clock, so a test can
//! drive the whole controller and then inspect what the devices saw.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use ibn_api::{AppState, build_router};
use ibn_commit::{CommitConfig, CommitEngine, CommitRegistry, ManualClock};
use ibn_controller::{IntentProcessor, RegexExtractor};
use ibn_discovery::{DiscoveryConfig, InMemorySchemaRepository, ModelCache, ModelDiscovery};
use ibn_protocol::{ChangePolicy, Device, IntentRequest, ProcessResponse};
use ibn_transport::{MockConnector, MockDevice};

/// Every model the built-in L3VPN requirements ask for, across vendors.
pub const L3VPN_MODELS: &[&str] = &[
    "ietf-l3vpn-svc@2018-01-19",
    "ietf-network-instance@2019-01-21",
    "openconfig-network-instance@2021-08-24",
    "Cisco-IOS-XR-mpls-vpn-cfg@2019-04-05",
    "cisco-xr-openconfig-network-instance-deviations@2019-04-05",
    "nokia-conf-service@2021-09-30",
    "nokia-state-service@2021-09-30",
];

/// End-to-end harness: processor + engine + router over mock devices.
pub struct TestHarness {
    _cache_dir: tempfile::TempDir,
    pub connector: Arc<MockConnector>,
    pub repository: Arc<InMemorySchemaRepository>,
    pub clock: Arc<ManualClock>,
    pub discovery: ModelDiscovery,
    pub processor: IntentProcessor,
    pub engine: CommitEngine,
    pub state: AppState,
    pub router: Router,
}

impl TestHarness {
    /// Harness whose schema repository can resolve every L3VPN model.
    pub fn new() -> Self {
        Self::with_repository(L3VPN_MODELS)
    }

    /// Harness whose schema repository only knows `models`.
    pub fn with_repository(models: &[&str]) -> Self {
        let cache_dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MockConnector::new());
        let repository = Arc::new(InMemorySchemaRepository::new().with_models(models));
        let cache = ModelCache::open(cache_dir.path(), Duration::from_secs(3600)).unwrap();
        let discovery = ModelDiscovery::new(
            connector.clone(),
            Arc::new(cache),
            repository.clone(),
            DiscoveryConfig::default(),
        );
        let processor = IntentProcessor::new(Arc::new(RegexExtractor::new()), discovery.clone());

        let clock = Arc::new(ManualClock::default());
        let engine = CommitEngine::new(
            connector.clone(),
            Arc::new(CommitRegistry::new(clock.clone())),
            CommitConfig::default(),
        );

        let state = AppState::new(processor.clone(), engine.clone(), connector.clone());
        let router = build_router(state.clone());

        Self {
            _cache_dir: cache_dir,
            connector,
            repository,
            clock,
            discovery,
            processor,
            engine,
            state,
            router,
        }
    }

    /// Put a mock device on the network under `device_id`.
    pub fn add_device(&self, device_id: &str, device: MockDevice) -> Arc<MockDevice> {
        self.connector.add(device_id, device)
    }

    /// Run the pipeline directly and make the inventory known to the
    /// engine, the way the API does for inline inventories.
    pub async fn process(
        &self,
        intent: &str,
        inventory: Vec<Device>,
        policy: ChangePolicy,
    ) -> ProcessResponse {
        self.engine.register_devices(&inventory);
        self.processor
            .process(IntentRequest {
                intent: intent.into(),
                inventory,
                policy,
                telemetry_hint: None,
            })
            .await
    }

    /// GET `uri` through the router. Returns (status, JSON body).
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(response).await
    }

    /// POST a JSON body to `uri` through the router.
    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Device reachable over nothing: discovery has to use the repositories.
pub fn offline(device_id: &str, vendor: ibn_protocol::Vendor) -> Device {
    Device::new(device_id, vendor).with_transports(false, false, false)
}
