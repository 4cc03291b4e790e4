//! Intent processor: runs the whole pipeline for one request.
//!
//! ```text
//! text ─▶ extractor ─▶ normalizer ─▶ risk ─▶ discovery ─▶ mapper ─▶ generator
//!                                                   ─▶ commit plan / verification plan / audit log
//! ```
//!
//! Nothing is pushed to devices here; the resulting payloads are handed to
//! the commit engine separately.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use ibn_commit::create_verification_plan;
use ibn_discovery::{DiscoveryResult, HttpSchemaRepository, ModelCache, ModelDiscovery};
use ibn_mapping::{create_mappings, generate};
use ibn_protocol::{
    AuditLog, CandidatePayload, ChangePolicy, CommitPlan, Device, ErrorResponse, IntentRequest,
    IntentResponse, ModelDiscoveryResult, ProcessResponse, RiskAssessment, RiskLevel, RollbackPlan,
};
use ibn_transport::{Cancellation, DeviceConnector};
use sha2::{Digest, Sha256};

use crate::config::ControllerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::extractor::{EntityExtractor, RegexExtractor};
use crate::normalizer::normalize;
use crate::risk::assess;

const SUMMARY_CHARS: usize = 200;
const PER_VENDOR_BATCH_THRESHOLD: usize = 5;
const HIGH_RISK_ROLLBACK_SECS: u64 = 120;
const DEFAULT_ROLLBACK_SECS: u64 = 300;

#[derive(Clone)]
pub struct IntentProcessor {
    extractor: Arc<dyn EntityExtractor>,
    discovery: ModelDiscovery,
    cancel: Cancellation,
}

impl IntentProcessor {
    pub fn new(extractor: Arc<dyn EntityExtractor>, discovery: ModelDiscovery) -> Self {
        Self {
            extractor,
            discovery,
            cancel: Cancellation::new(),
        }
    }

    /// Processor with the regex extractor, an on-disk model cache and HTTP
    /// schema repositories, all taken from `config`.
    pub fn from_config(
        config: &ControllerConfig,
        connector: Arc<dyn DeviceConnector>,
    ) -> DiscoveryResult<Self> {
        let cache = ModelCache::open(&config.cache_dir, config.discovery.cache_max_age())?;
        let repository = HttpSchemaRepository::new(config.repositories.clone())?;
        let discovery = ModelDiscovery::new(
            connector,
            Arc::new(cache),
            Arc::new(repository),
            config.discovery.clone(),
        );
        Ok(Self::new(Arc::new(RegexExtractor::new()), discovery))
    }

    /// Stop in-flight discovery when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pipeline. Never fails: pipeline errors and panics come back
    /// as [`ProcessResponse::Failed`] with a HIGH risk assessment.
    pub async fn process(&self, request: IntentRequest) -> ProcessResponse {
        let intent_summary = summarize(&request.intent);
        let processor = self.clone();
        let outcome = match tokio::spawn(async move { processor.run(request).await }).await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Aborted(join_error_message(e))),
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    risk = ?response.risk_assessment.level,
                    payloads = response.candidate_payloads.len(),
                    "intent processed"
                );
                ProcessResponse::Completed(Box::new(response))
            }
            Err(e) => {
                tracing::error!(error = %e, "intent processing failed");
                ProcessResponse::Failed(ErrorResponse {
                    error: e.to_string(),
                    intent_summary,
                    risk_assessment: RiskAssessment::processing_error(),
                })
            }
        }
    }

    async fn run(&self, request: IntentRequest) -> PipelineResult<IntentResponse> {
        let inventory = &request.inventory;
        ensure_unique_ids(inventory)?;

        let entities = self.extractor.extract(&request.intent).await?;
        tracing::debug!(
            extractor = self.extractor.name(),
            devices = entities.devices.len(),
            "entities extracted"
        );
        let intent = normalize(
            &request.intent,
            &entities,
            request.telemetry_hint.as_ref(),
        );
        let risk_assessment = assess(&intent, inventory, &request.policy);

        let model_discovery = self
            .discovery
            .discover_with_cancel(inventory, &intent, &self.cancel)
            .await;
        let mapping_table = create_mappings(&intent, inventory, &model_discovery);
        let candidate_payloads = generate(&intent, &mapping_table, inventory);

        Ok(IntentResponse {
            intent_summary: summarize(&request.intent),
            commit_plan: commit_plan(&candidate_payloads, &risk_assessment, &request.policy),
            verification_plan: create_verification_plan(&intent, inventory),
            audit_log: audit_log(&model_discovery, &candidate_payloads),
            risk_assessment,
            model_discovery,
            normalized_intent: intent,
            mapping_table,
            candidate_payloads,
        })
    }
}

fn ensure_unique_ids(inventory: &[Device]) -> PipelineResult<()> {
    let mut seen = HashSet::new();
    for device in inventory {
        if !seen.insert(device.device_id.as_str()) {
            return Err(PipelineError::DuplicateDevice(device.device_id.clone()));
        }
    }
    Ok(())
}

fn join_error_message(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let panic = e.into_panic();
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "pipeline panicked".to_string())
}

/// First 200 characters on one line, with an ellipsis when cut.
pub fn summarize(text: &str) -> String {
    let mut summary: String = text.chars().take(SUMMARY_CHARS).collect();
    if text.chars().count() > SUMMARY_CHARS {
        summary.push_str("...");
    }
    summary.replace(['\n', '\r'], " ").trim().to_string()
}

pub fn commit_plan(
    payloads: &[CandidatePayload],
    risk: &RiskAssessment,
    policy: &ChangePolicy,
) -> CommitPlan {
    let high = risk.level == RiskLevel::High;
    let strategy = if high {
        "dry-run+manual-review+staged-commit"
    } else {
        "candidate+validate+confirmed-commit"
    };
    let batching = if payloads.len() > PER_VENDOR_BATCH_THRESHOLD {
        "per-vendor"
    } else {
        "all-at-once"
    };
    let timeout_seconds = policy.rollback_timeout.unwrap_or(if high {
        HIGH_RISK_ROLLBACK_SECS
    } else {
        DEFAULT_ROLLBACK_SECS
    });
    CommitPlan {
        strategy: strategy.into(),
        batching: batching.into(),
        rollback: RollbackPlan {
            method: "confirmed-commit-timeout".into(),
            timeout_seconds,
        },
        maintenance_window: policy.maintenance_window.clone(),
    }
}

pub fn payload_hash(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub fn audit_log(discovery: &[ModelDiscoveryResult], payloads: &[CandidatePayload]) -> AuditLog {
    let sources: BTreeSet<&str> = discovery.iter().map(|r| r.source.as_str()).collect();
    let hashes: BTreeMap<String, String> = payloads
        .iter()
        .enumerate()
        .map(|(i, p)| (format!("payload_{i}"), payload_hash(&p.payload)))
        .collect();
    AuditLog {
        timestamp: Utc::now(),
        sources: sources.into_iter().map(String::from).collect(),
        hashes,
    }
}

/// True when every payload in the response still matches its audit hash.
pub fn verify_audit(response: &IntentResponse) -> bool {
    let hashes = &response.audit_log.hashes;
    hashes.len() == response.candidate_payloads.len()
        && response
            .candidate_payloads
            .iter()
            .enumerate()
            .all(|(i, p)| hashes.get(&format!("payload_{i}")) == Some(&payload_hash(&p.payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ibn_discovery::{DiscoveryConfig, InMemorySchemaRepository};
    use ibn_protocol::{DiscoverySource, ExtractedEntities, MaintenanceWindow, Transport, Vendor};
    use ibn_transport::{MockConnector, MockDevice};

    struct PanickingExtractor;

    #[async_trait]
    impl EntityExtractor for PanickingExtractor {
        async fn extract(&self, _text: &str) -> PipelineResult<ExtractedEntities> {
            panic!("extractor blew up");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        connector: Arc<MockConnector>,
        discovery: ModelDiscovery,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MockConnector::new());
        let cache = ModelCache::open(dir.path(), std::time::Duration::from_secs(3600)).unwrap();
        let repository = InMemorySchemaRepository::new().with_models(&[
            "ietf-l3vpn-svc@2018-01-19",
            "ietf-network-instance@2019-01-21",
            "openconfig-network-instance@2021-08-24",
        ]);
        let discovery = ModelDiscovery::new(
            connector.clone(),
            Arc::new(cache),
            Arc::new(repository),
            DiscoveryConfig::default(),
        );
        Fixture {
            _dir: dir,
            connector,
            discovery,
        }
    }

    fn request(text: &str, inventory: Vec<Device>) -> IntentRequest {
        IntentRequest {
            intent: text.into(),
            inventory,
            policy: ChangePolicy::default(),
            telemetry_hint: None,
        }
    }

    #[tokio::test]
    async fn full_pipeline_produces_payload_per_device() {
        let fx = fixture();
        fx.connector.add(
            "PE1",
            MockDevice::new().with_models(&[
                "ietf-l3vpn-svc@2018-01-19",
                "ietf-network-instance@2019-01-21",
                "openconfig-network-instance@2021-08-24",
                "Cisco-IOS-XR-mpls-vpn-cfg@2019-04-05",
                "cisco-xr-openconfig-network-instance-deviations@2019-04-05",
            ]),
        );
        let inventory = vec![
            Device::new("PE1", Vendor::Cisco),
            Device::new("PE2", Vendor::Generic).with_transports(false, false, false),
        ];
        let processor = IntentProcessor::new(Arc::new(RegexExtractor::new()), fx.discovery);

        let resp = processor
            .process(request("Create L3VPN vrf CUST_A between PE1 and PE2 with BFD", inventory))
            .await;

        let resp = resp.completed().expect("pipeline should complete");
        assert_eq!(resp.normalized_intent.vrf_name(), "CUST_A");
        assert_eq!(resp.model_discovery.len(), 2);
        assert_eq!(resp.model_discovery[0].source, DiscoverySource::OnDeviceNetconf);
        assert_eq!(resp.model_discovery[1].source, DiscoverySource::Repository);
        assert_eq!(resp.mapping_table.len(), 2);
        assert_eq!(resp.candidate_payloads.len(), 2);
        assert_eq!(resp.candidate_payloads[0].transport, Transport::Netconf);
        assert_eq!(resp.audit_log.sources, vec!["on-device-netconf", "repository"]);
        assert!(verify_audit(resp));
        assert_eq!(resp.risk_assessment.level, RiskLevel::Medium);
        assert_eq!(resp.commit_plan.rollback.timeout_seconds, 300);
        assert!(resp.verification_plan.tests.contains(&"BFD session establishment".to_string()));
    }

    #[tokio::test]
    async fn duplicate_device_ids_fail_the_pipeline() {
        let fx = fixture();
        let processor = IntentProcessor::new(Arc::new(RegexExtractor::new()), fx.discovery);
        let inventory = vec![
            Device::new("PE1", Vendor::Cisco),
            Device::new("PE1", Vendor::Nokia),
        ];

        let resp = processor.process(request("l3vpn on PE1", inventory)).await;

        match resp {
            ProcessResponse::Failed(e) => {
                assert!(e.error.contains("PE1"));
                assert_eq!(e.risk_assessment, RiskAssessment::processing_error());
                assert_eq!(e.intent_summary, "l3vpn on PE1");
            }
            ProcessResponse::Completed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn panicking_stage_becomes_failed_response() {
        let fx = fixture();
        let processor = IntentProcessor::new(Arc::new(PanickingExtractor), fx.discovery);

        let resp = processor.process(request("anything", vec![])).await;

        match resp {
            ProcessResponse::Failed(e) => {
                assert!(e.error.contains("extractor blew up"));
                assert_eq!(e.risk_assessment.level, RiskLevel::High);
            }
            ProcessResponse::Completed(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn summary_is_truncated_and_flattened() {
        assert_eq!(summarize("  line one\nline two  "), "line one line two");
        let long = "x".repeat(250);
        let s = summarize(&long);
        assert_eq!(s.len(), 203);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn commit_plan_follows_risk_and_policy() {
        let high = RiskAssessment::processing_error();
        let plan = commit_plan(&[], &high, &ChangePolicy::default());
        assert_eq!(plan.strategy, "dry-run+manual-review+staged-commit");
        assert_eq!(plan.batching, "all-at-once");
        assert_eq!(plan.rollback.timeout_seconds, 120);

        let policy = ChangePolicy {
            rollback_timeout: Some(900),
            maintenance_window: Some(MaintenanceWindow {
                start: "2026-01-10T02:00:00Z".into(),
                duration_min: 60,
            }),
            ..ChangePolicy::default()
        };
        let low = RiskAssessment {
            level: RiskLevel::Low,
            factors: vec!["Standard configuration change".into()],
            mitigations: vec!["Follow standard procedures".into()],
        };
        let payloads: Vec<CandidatePayload> = (0..6)
            .map(|i| CandidatePayload {
                target: format!("PE{i}"),
                vendor: Vendor::Cisco,
                transport: Transport::Netconf,
                payload_type: ibn_protocol::PayloadType::Xml,
                payload: "<config/>".into(),
                prechecks: vec![],
                post_validation: vec![],
            })
            .collect();
        let plan = commit_plan(&payloads, &low, &policy);
        assert_eq!(plan.strategy, "candidate+validate+confirmed-commit");
        assert_eq!(plan.batching, "per-vendor");
        assert_eq!(plan.rollback.timeout_seconds, 900);
        assert!(plan.maintenance_window.is_some());
    }

    #[test]
    fn audit_hashes_payload_text() {
        let payload = CandidatePayload {
            target: "PE1".into(),
            vendor: Vendor::Nokia,
            transport: Transport::Netconf,
            payload_type: ibn_protocol::PayloadType::Xml,
            payload: "<config><vprn/></config>".into(),
            prechecks: vec![],
            post_validation: vec![],
        };
        let log = audit_log(&[], std::slice::from_ref(&payload));
        assert_eq!(log.hashes["payload_0"], payload_hash("<config><vprn/></config>"));
        assert_eq!(log.hashes["payload_0"].len(), 64);
        assert!(log.sources.is_empty());
    }
}
