//! Post-deployment verification plans and their execution.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ibn_protocol::{Device, NormalizedIntent, ServiceType, ValidationResult, VerificationPlan};
use ibn_transport::{Datastore, DeviceConnector, TransportError, TransportResult, with_timeout};
use tokio::task::JoinSet;

const GNMI_PREFIX: &str = "gnmi:";
const NETCONF_PREFIX: &str = "netconf filter: ";

const BASE_QUERIES: [&str; 3] = [
    "gnmi:/interfaces/interface/state/oper-status",
    "gnmi:/interfaces/interface/state/admin-status",
    "netconf filter: <interfaces><interface><name/><enabled/></interface></interfaces>",
];

const L3VPN_QUERIES: [&str; 3] = [
    "gnmi:/network-instances/network-instance/state/name",
    "gnmi:/bgp/neighbors/neighbor/state/session-state",
    "netconf filter: <routing-instances><instance><name/><instance-type/></instance></routing-instances>",
];

const BGP_QUERIES: [&str; 3] = [
    "gnmi:/bgp/global/state/as",
    "gnmi:/bgp/neighbors/neighbor/state/established-transitions",
    "netconf filter: <bgp><neighbors><neighbor><peer-as/><state/></neighbor></neighbors></bgp>",
];

const L3VPN_TESTS: [&str; 6] = [
    "VRF creation verification",
    "Route distinguisher configuration check",
    "Route target import/export verification",
    "BGP VPNv4 neighbor establishment",
    "VRF routing table population check",
    "Inter-VRF connectivity test",
];

const EVPN_TESTS: [&str; 7] = [
    "EVPN instance creation verification",
    "EVI configuration check",
    "BGP EVPN neighbor establishment",
    "MAC learning verification",
    "EVPN route advertisement check",
    "L2 connectivity test between endpoints",
    "MAC mobility test",
];

const BGP_TESTS: [&str; 5] = [
    "BGP process status check",
    "BGP neighbor establishment",
    "BGP session state verification",
    "Route advertisement verification",
    "BGP table convergence check",
];

const BFD_TESTS: [&str; 4] = [
    "BFD session establishment",
    "BFD neighbor discovery",
    "BFD failure detection test",
    "BFD convergence time measurement",
];

/// Build the checks and telemetry queries that confirm an intent took effect.
pub fn create_verification_plan(intent: &NormalizedIntent, _inventory: &[Device]) -> VerificationPlan {
    let mut tests: Vec<String> = Vec::new();
    match intent.service_type {
        ServiceType::L3vpn => {
            tests.extend(L3VPN_TESTS.iter().map(|t| t.to_string()));
            // Endpoints pair up as (0,1), (2,3), ...
            for pair in intent.endpoints.chunks_exact(2) {
                let (a, b) = (&pair[0].device, &pair[1].device);
                tests.push(format!("Ping test from {a} to {b}"));
                tests.push(format!("Traceroute {a} to {b}"));
            }
        }
        ServiceType::Evpn => tests.extend(EVPN_TESTS.iter().map(|t| t.to_string())),
        ServiceType::Bgp => tests.extend(BGP_TESTS.iter().map(|t| t.to_string())),
        _ => {}
    }
    if intent.policy.bfd {
        tests.extend(BFD_TESTS.iter().map(|t| t.to_string()));
    }
    if let Some(slo) = &intent.slo {
        if let Some(latency) = slo.latency_ms {
            tests.push(format!("Latency measurement (target: {latency}ms)"));
        }
        if let Some(loss) = slo.loss_pct {
            tests.push(format!("Packet loss measurement (target: <{loss}%)"));
        }
        if let Some(jitter) = slo.jitter_ms {
            tests.push(format!("Jitter measurement (target: <{jitter}ms)"));
        }
    }

    let mut telemetry_queries: Vec<String> = BASE_QUERIES.iter().map(|q| q.to_string()).collect();
    match intent.service_type {
        ServiceType::L3vpn => telemetry_queries.extend(L3VPN_QUERIES.iter().map(|q| q.to_string())),
        ServiceType::Bgp => telemetry_queries.extend(BGP_QUERIES.iter().map(|q| q.to_string())),
        _ => {}
    }

    VerificationPlan {
        tests,
        telemetry_queries,
    }
}

/// A parsed telemetry query.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
    Gnmi(String),
    Netconf(String),
}

impl Query {
    fn parse(raw: &str) -> Option<Self> {
        if let Some(path) = raw.strip_prefix(GNMI_PREFIX) {
            Some(Self::Gnmi(path.trim().to_string()))
        } else {
            raw.strip_prefix(NETCONF_PREFIX)
                .map(|filter| Self::Netconf(filter.trim().to_string()))
        }
    }

    fn applies_to(&self, device: &Device) -> bool {
        match self {
            Self::Gnmi(_) => device.gnmi_enabled,
            Self::Netconf(_) => device.netconf_enabled,
        }
    }

    async fn run(
        &self,
        connector: &dyn DeviceConnector,
        device: &Device,
        timeout: Duration,
    ) -> TransportResult<()> {
        match self {
            Self::Gnmi(path) => {
                let session = with_timeout("gnmi connect", timeout, connector.gnmi(device)).await?;
                let values = with_timeout("gnmi get", timeout, session.get(&[path.clone()])).await;
                if let Err(e) = session.close().await {
                    tracing::debug!(device_id = %device.device_id, error = %e, "gnmi close failed");
                }
                if values?.is_empty() {
                    return Err(TransportError::Protocol(format!("no data at {path}")));
                }
                Ok(())
            }
            Self::Netconf(filter) => {
                let session =
                    with_timeout("netconf connect", timeout, connector.netconf(device)).await?;
                let reply = with_timeout(
                    "get-config",
                    timeout,
                    session.get_config(Datastore::Running, Some(filter)),
                )
                .await;
                if let Err(e) = session.close().await {
                    tracing::debug!(device_id = %device.device_id, error = %e, "netconf close failed");
                }
                reply.map(|_| ())
            }
        }
    }
}

/// Picks the telemetry query that backs a test, by keyword.
fn query_for_test<'a>(test: &str, queries: &'a [String]) -> Option<&'a str> {
    let lower = test.to_ascii_lowercase();
    let needle = if lower.contains("bgp") || lower.contains("neighbor establishment") {
        "bgp"
    } else if lower.contains("vrf")
        || lower.contains("route distinguisher")
        || lower.contains("route target")
        || lower.contains("evpn instance")
        || lower.contains("evi ")
    {
        "network-instance"
    } else if lower.contains("connectivity") || lower.contains("interface") {
        "interfaces"
    } else {
        return None;
    };
    queries
        .iter()
        .map(String::as_str)
        .find(|q| q.to_ascii_lowercase().contains(needle))
}

/// Execute a verification plan against the inventory.
///
/// Every telemetry query runs on each device that speaks its transport.
/// The returned results hold one entry per test, then one per query. A test
/// passes when the query it maps to succeeded on every eligible device;
/// tests with no backing query (traffic measurements) are reported as not
/// verified.
pub async fn run_verification(
    plan: &VerificationPlan,
    inventory: &[Device],
    connector: Arc<dyn DeviceConnector>,
    timeout: Duration,
) -> Vec<ValidationResult> {
    let started = Instant::now();
    let mut tasks = JoinSet::new();
    for raw in &plan.telemetry_queries {
        let Some(query) = Query::parse(raw) else {
            tracing::warn!(query = %raw, "unrecognised telemetry query, skipping");
            continue;
        };
        for device in inventory.iter().filter(|d| query.applies_to(d)) {
            let connector = Arc::clone(&connector);
            let device = device.clone();
            let query = query.clone();
            let raw = raw.clone();
            tasks.spawn(async move {
                let outcome = query.run(connector.as_ref(), &device, timeout).await;
                (raw, device.device_id, outcome.map_err(|e| e.to_string()))
            });
        }
    }

    let mut outcomes: BTreeMap<String, Vec<(String, Result<(), String>)>> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((raw, device_id, outcome)) => {
                if let Err(e) = &outcome {
                    tracing::warn!(device_id = %device_id, query = %raw, error = %e, "telemetry query failed");
                }
                outcomes.entry(raw).or_default().push((device_id, outcome));
            }
            Err(e) => tracing::error!(error = %e, "verification task failed"),
        }
    }
    for per_device in outcomes.values_mut() {
        per_device.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let summarize = |raw: &str| -> (bool, String) {
        match outcomes.get(raw) {
            None => (false, format!("No device in inventory answers {raw}")),
            Some(per_device) => {
                let failures: Vec<String> = per_device
                    .iter()
                    .filter_map(|(id, r)| r.as_ref().err().map(|e| format!("{id}: {e}")))
                    .collect();
                if failures.is_empty() {
                    (true, format!("{} device(s) responded", per_device.len()))
                } else {
                    (false, failures.join("; "))
                }
            }
        }
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let result = |success: bool, name: &str, details: String| ValidationResult {
        duration_ms: Some(elapsed_ms),
        timestamp: Utc::now(),
        ..ValidationResult::new(success, name, details)
    };

    let mut results = Vec::with_capacity(plan.tests.len() + plan.telemetry_queries.len());
    for test in &plan.tests {
        match query_for_test(test, &plan.telemetry_queries) {
            Some(raw) => {
                let (ok, details) = summarize(raw);
                results.push(result(ok, test, format!("{raw}: {details}")));
            }
            None => results.push(result(
                false,
                test,
                "Not verifiable from telemetry; manual verification required".into(),
            )),
        }
    }
    for raw in &plan.telemetry_queries {
        let (ok, details) = summarize(raw);
        results.push(result(ok, raw, details));
    }
    results
}
