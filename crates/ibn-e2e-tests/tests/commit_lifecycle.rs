//! E2E tests for validate / commit / confirm / rollback / expiry.

mod helpers;

use std::time::Duration;

use helpers::{L3VPN_MODELS, TestHarness};
use ibn_commit::run_verification;
use ibn_protocol::{CandidatePayload, ChangePolicy, Device, Vendor};
use ibn_transport::{MockDevice, MockOp};
use tracing_test::traced_test;

/// Run the pipeline for PE1 (Cisco, live NETCONF) and return its payloads.
async fn l3vpn_payloads(h: &TestHarness) -> Vec<CandidatePayload> {
    let resp = h
        .process(
            "Create L3VPN vrf CUST_A on PE1 with BGP AS 65010",
            vec![Device::new("PE1", Vendor::Cisco)],
            ChangePolicy::default(),
        )
        .await;
    resp.completed().unwrap().candidate_payloads.clone()
}

/// An unconfirmed commit expires: cleanup drops it with a warning and
/// without touching the device.
#[tokio::test]
#[traced_test]
async fn e2e_confirmed_commit_expires_without_network_calls() {
    let h = TestHarness::new();
    let device = h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    let payloads = l3vpn_payloads(&h).await;

    let results = h.engine.commit_configurations(&payloads, true, 1).await;
    assert!(results[0].success, "{:?}", results[0].error_message);
    assert!(device.called(MockOp::ConfirmedCommit));
    assert_eq!(h.engine.get_active_commits().len(), 1);

    let calls_before = device.calls().len();

    h.clock.advance(chrono::Duration::seconds(59));
    assert!(h.engine.cleanup_expired_commits().is_empty());
    assert!(!logs_contain("confirmed commit expired without confirmation"));

    h.clock.advance(chrono::Duration::seconds(2));
    assert_eq!(h.engine.cleanup_expired_commits(), vec!["PE1".to_string()]);
    logs_assert(|lines: &[&str]| {
        let expired: Vec<_> = lines
            .iter()
            .filter(|l| l.contains("confirmed commit expired without confirmation"))
            .collect();
        match expired[..] {
            [line] if line.contains("WARN") && line.contains("target_device=PE1") => Ok(()),
            _ => Err(format!("expected one expiry warning for PE1, got {expired:?}")),
        }
    });
    assert!(h.engine.get_active_commits().is_empty());
    assert_eq!(device.calls().len(), calls_before);
}

/// A device that rejects validation is never asked to commit.
#[tokio::test]
async fn e2e_failed_validation_never_commits() {
    let h = TestHarness::new();
    let device = h.add_device(
        "PE1",
        MockDevice::new()
            .with_models(L3VPN_MODELS)
            .failing(MockOp::Validate),
    );
    let payloads = l3vpn_payloads(&h).await;

    let results = h.engine.commit_configurations(&payloads, true, 5).await;
    assert!(!results[0].success);
    assert!(
        results[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Configuration validation failed")
    );
    assert_eq!(results[0].rollback_info.as_ref().unwrap()["discarded"], true);
    assert!(!device.called(MockOp::Commit));
    assert!(!device.called(MockOp::ConfirmedCommit));
    assert!(device.called(MockOp::DiscardChanges));
    assert!(h.engine.get_active_commits().is_empty());
    assert_eq!(h.connector.open_sessions(), 0);
}

/// Only successful confirmed commits enter the registry.
#[tokio::test]
async fn e2e_registry_holds_only_confirmed_successes() {
    let h = TestHarness::new();
    h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    h.add_device(
        "PE2",
        MockDevice::new()
            .with_models(L3VPN_MODELS)
            .failing(MockOp::ConfirmedCommit),
    );
    let resp = h
        .process(
            "Create L3VPN vrf CUST_A between PE1 and PE2",
            vec![Device::new("PE1", Vendor::Cisco), Device::new("PE2", Vendor::Cisco)],
            ChangePolicy::default(),
        )
        .await;
    let payloads = resp.completed().unwrap().candidate_payloads.clone();

    let results = h.engine.commit_configurations(&payloads, true, 10).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert!(!results[1].success);
    let active = h.engine.get_active_commits();
    assert_eq!(active.keys().collect::<Vec<_>>(), vec!["PE1"]);
    assert_eq!(
        active["PE1"].commit_id,
        results[0].commit_id.clone().unwrap()
    );

    // Unconfirmed commits are final and never registered.
    let results = h.engine.commit_configurations(&payloads[..1], false, 10).await;
    assert!(results[0].success);
    assert_eq!(h.engine.get_active_commits().len(), 1);
}

/// Confirm finalises the commit; a second confirm has nothing to do.
#[tokio::test]
async fn e2e_confirm_then_confirm_again() {
    let h = TestHarness::new();
    let device = h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    let payloads = l3vpn_payloads(&h).await;
    h.engine.commit_configurations(&payloads, true, 10).await;

    let results = h.engine.confirm_commits(None).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert!(device.called(MockOp::Commit));
    assert!(device.running_config().is_some());
    assert!(h.engine.get_active_commits().is_empty());

    let results = h.engine.confirm_commits(Some(&["PE1".to_string()])).await;
    assert!(!results[0].success);
    assert_eq!(
        results[0].error_message.as_deref(),
        Some("No pending confirmed commit")
    );
}

/// Rollback discards on the device and forgets the pending commit.
#[tokio::test]
async fn e2e_rollback_discards_pending_commit() {
    let h = TestHarness::new();
    let device = h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    let payloads = l3vpn_payloads(&h).await;
    h.engine.commit_configurations(&payloads, true, 10).await;

    let results = h.engine.rollback_configurations(None).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].commit_id.as_deref(), Some("rollback"));
    assert!(device.called(MockOp::DiscardChanges));
    assert!(h.engine.get_active_commits().is_empty());
}

/// Dry-run validation leaves the candidate untouched.
#[tokio::test]
async fn e2e_dry_run_validation_does_not_edit() {
    let h = TestHarness::new();
    let device = h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    let payloads = l3vpn_payloads(&h).await;

    let results = h.engine.validate_configuration(&payloads, true).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(results[0].target.as_deref(), Some("PE1"));
    assert!(device.called(MockOp::Validate));
    assert!(!device.called(MockOp::EditConfig));
}

/// Telemetry queries run against the devices that speak their transport.
#[tokio::test]
async fn e2e_verification_queries_reach_devices() {
    let h = TestHarness::new();
    h.add_device("PE1", MockDevice::new().with_models(L3VPN_MODELS));
    let inventory = vec![Device::new("PE1", Vendor::Cisco).with_transports(true, true, false)];
    let resp = h
        .process("Create L3VPN vrf CUST_A on PE1", inventory.clone(), ChangePolicy::default())
        .await;
    let plan = resp.completed().unwrap().verification_plan.clone();

    let results = run_verification(&plan, &inventory, h.connector.clone(), Duration::from_secs(5)).await;
    assert_eq!(results.len(), plan.tests.len() + plan.telemetry_queries.len());

    let vrf = results
        .iter()
        .find(|r| r.test_name == "VRF creation verification")
        .unwrap();
    assert!(vrf.success, "{}", vrf.details);
    for query in &plan.telemetry_queries {
        let r = results.iter().find(|r| &r.test_name == query).unwrap();
        assert!(r.success, "{query}: {}", r.details);
    }
}
