//! API route definitions and router builder.

pub mod deployments;
pub mod devices;
pub mod health;
pub mod intents;

use axum::Router;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Inventory
        .route(
            "/devices",
            get(devices::list_devices).post(devices::register_device),
        )
        .route("/devices/{id}", get(devices::get_device))
        // Intents
        .route(
            "/intents",
            get(intents::list_intents).post(intents::submit_intent),
        )
        .route("/intents/{id}", get(intents::get_intent))
        // Deployments
        .route("/deployments/validate", post(deployments::validate))
        .route("/deployments/commit", post(deployments::commit))
        .route("/deployments/confirm", post(deployments::confirm))
        .route("/deployments/rollback", post(deployments::rollback))
        .route("/deployments/verify", post(deployments::verify))
        .route("/deployments/active", get(deployments::active));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use ibn_commit::{CommitConfig, CommitEngine, CommitRegistry, SystemClock};
    use ibn_controller::{IntentProcessor, RegexExtractor};
    use ibn_discovery::{DiscoveryConfig, InMemorySchemaRepository, ModelCache, ModelDiscovery};
    use ibn_transport::{MockConnector, MockDevice, MockOp};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const MODELS: &[&str] = &[
        "ietf-l3vpn-svc@2018-01-19",
        "ietf-network-instance@2019-01-21",
        "openconfig-network-instance@2021-08-24",
    ];

    struct TestApp {
        _dir: tempfile::TempDir,
        connector: Arc<MockConnector>,
        router: Router,
    }

    impl TestApp {
        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let response = self
                .router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            read(response).await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
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
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MockConnector::new());
        let cache = ModelCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
        let discovery = ModelDiscovery::new(
            connector.clone(),
            Arc::new(cache),
            Arc::new(InMemorySchemaRepository::new().with_models(MODELS)),
            DiscoveryConfig::default(),
        );
        let processor = IntentProcessor::new(Arc::new(RegexExtractor::new()), discovery);
        let engine = CommitEngine::new(
            connector.clone(),
            Arc::new(CommitRegistry::new(Arc::new(SystemClock))),
            CommitConfig::default(),
        );
        let state = AppState::new(processor, engine, connector.clone());
        TestApp {
            _dir: dir,
            connector,
            router: build_router(state),
        }
    }

    fn pe1() -> Value {
        json!({"device_id": "PE1", "vendor": "cisco", "os_version": "7.9.1"})
    }

    async fn submit_l3vpn(app: &TestApp) -> String {
        let (status, record) = app
            .post(
                "/api/v1/intents",
                json!({"intent": "Create L3VPN vrf CUST_A on PE1", "inventory": [pe1()]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        record["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (status, json) = app().get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["devices"], 0);
        assert_eq!(json["pending_commits"], 0);
    }

    #[tokio::test]
    async fn health_counts_pending_commits() {
        let app = app();
        app.connector
            .add("PE1", MockDevice::new().with_models(MODELS));
        let id = submit_l3vpn(&app).await;
        app.post("/api/v1/deployments/commit", json!({"intent_id": id}))
            .await;

        let (_, json) = app.get("/health").await;
        assert_eq!(json["devices"], 1);
        assert_eq!(json["intents"], 1);
        assert_eq!(json["pending_commits"], 1);
    }

    #[tokio::test]
    async fn register_and_list_devices() {
        let app = app();
        let (status, json) = app.post("/api/v1/devices", pe1()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["device_id"], "PE1");
        assert_eq!(json["netconf_enabled"], true);

        let (status, json) = app.get("/api/v1/devices").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);

        let (status, _) = app.get("/api/v1/devices/PE1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_device_conflicts() {
        let app = app();
        app.post("/api/v1/devices", pe1()).await;
        let (status, json) = app.post("/api/v1/devices", pe1()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["status"], 409);
    }

    #[tokio::test]
    async fn unknown_device_not_found() {
        let (status, _) = app().get("/api/v1/devices/ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_intent_is_rejected() {
        let (status, _) = app()
            .post("/api/v1/intents", json!({"intent": "   "}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submitted_intent_is_stored() {
        let app = app();
        app.connector.add("PE1", MockDevice::new().with_models(MODELS));
        let id = submit_l3vpn(&app).await;

        let (status, list) = app.get("/api/v1/intents").await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], id.as_str());
        assert_eq!(list[0]["completed"], true);

        let (status, record) = app.get(&format!("/api/v1/intents/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["response"]["normalized_intent"]["service_type"], "l3vpn");
        assert_eq!(
            record["response"]["candidate_payloads"][0]["target"],
            "PE1"
        );

        // Inline inventory joins the registered inventory.
        let (_, devices) = app.get("/api/v1/devices").await;
        assert_eq!(devices.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_pipeline_is_stored_as_failure() {
        let app = app();
        let (status, record) = app
            .post(
                "/api/v1/intents",
                json!({"intent": "Create L3VPN", "inventory": [pe1(), pe1()]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["response"]["risk_assessment"]["level"], "HIGH");
        assert!(record["response"]["error"].as_str().unwrap().contains("PE1"));

        let (_, list) = app.get("/api/v1/intents").await;
        assert_eq!(list[0]["completed"], false);
        assert_eq!(list[0]["payloads"], 0);
    }

    #[tokio::test]
    async fn unknown_intent_not_found() {
        let app = app();
        let (status, _) = app
            .get("/api/v1/intents/0190a5e4-9b1c-7c3e-8f00-000000000000")
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/api/v1/intents/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deployment_needs_a_payload_source() {
        let (status, json) = app()
            .post("/api/v1/deployments/validate", json!({"dry_run": true}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("intent_id"));
    }

    #[tokio::test]
    async fn commit_confirm_cycle() {
        let app = app();
        let device = app
            .connector
            .add("PE1", MockDevice::new().with_models(MODELS));
        let id = submit_l3vpn(&app).await;

        let (status, results) = app
            .post("/api/v1/deployments/validate", json!({"intent_id": id, "dry_run": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results[0]["success"], true);
        assert!(!device.called(MockOp::EditConfig));

        let (status, results) = app
            .post(
                "/api/v1/deployments/commit",
                json!({"intent_id": id, "timeout_minutes": 5}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results[0]["success"], true);
        assert_eq!(
            results[0]["rollback_info"]["method"],
            "confirmed-commit-timeout"
        );

        let (_, active) = app.get("/api/v1/deployments/active").await;
        assert!(active.get("PE1").is_some());

        let (status, results) = app.post("/api/v1/deployments/confirm", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results.as_array().unwrap().len(), 1);
        assert_eq!(results[0]["success"], true);

        let (_, active) = app.get("/api/v1/deployments/active").await;
        assert!(active.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_clears_pending_commit() {
        let app = app();
        let device = app
            .connector
            .add("PE1", MockDevice::new().with_models(MODELS));
        let id = submit_l3vpn(&app).await;
        app.post("/api/v1/deployments/commit", json!({"intent_id": id}))
            .await;

        let (status, results) = app
            .post("/api/v1/deployments/rollback", json!({"targets": ["PE1"]}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results[0]["success"], true);
        assert_eq!(results[0]["commit_id"], "rollback");
        assert!(device.called(MockOp::DiscardChanges));

        let (_, active) = app.get("/api/v1/deployments/active").await;
        assert!(active.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_confirm_timeout_rejected() {
        let app = app();
        let device = app
            .connector
            .add("PE1", MockDevice::new().with_models(MODELS));
        let id = submit_l3vpn(&app).await;
        let calls_before = device.calls().len();
        for minutes in [0, 1_000_000_000_000_000_u64] {
            let (status, body) = app
                .post(
                    "/api/v1/deployments/commit",
                    json!({"intent_id": id, "timeout_minutes": minutes}),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("timeout_minutes"));
        }
        assert_eq!(device.calls().len(), calls_before);
        let (_, active) = app.get("/api/v1/deployments/active").await;
        assert!(active.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_unknown_intent_not_found() {
        let (status, _) = app()
            .post(
                "/api/v1/deployments/verify",
                json!({"intent_id": "0190a5e4-9b1c-7c3e-8f00-000000000000"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
