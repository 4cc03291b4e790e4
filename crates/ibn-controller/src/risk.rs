//! Change risk assessment.

use std::collections::BTreeSet;

use ibn_protocol::{ChangePolicy, Device, NormalizedIntent, RiskAssessment, RiskLevel};

/// Latency targets below this are treated as aggressive.
const AGGRESSIVE_LATENCY_MS: f64 = 10.0;

/// Score an intent against its inventory and change policy.
///
/// Each rule can only raise the level, so adding a risk factor never lowers
/// the result.
pub fn assess(intent: &NormalizedIntent, inventory: &[Device], policy: &ChangePolicy) -> RiskAssessment {
    let mut level = RiskLevel::Low;
    let mut factors = Vec::new();
    let mut mitigations = Vec::new();
    let mut raise = |to: RiskLevel, factor: &str, mitigation: &str| {
        level = level.max(to);
        factors.push(factor.to_string());
        mitigations.push(mitigation.to_string());
    };

    if intent.service_type.is_core_routing() {
        raise(
            RiskLevel::Medium,
            "Core routing modification required",
            "Use confirmed-commit with auto-rollback",
        );
    }

    let vendors: BTreeSet<_> = inventory.iter().map(Device::vendor_key).collect();
    if vendors.len() > 1 {
        raise(
            RiskLevel::Medium,
            "Multi-vendor environment detected",
            "Validate vendor-specific YANG models",
        );
    }

    if policy.maintenance_window.is_none() {
        raise(
            RiskLevel::Medium,
            "No maintenance window specified",
            "Schedule during low-traffic period",
        );
    }

    if intent
        .latency_target_ms()
        .is_some_and(|ms| ms < AGGRESSIVE_LATENCY_MS)
    {
        raise(
            RiskLevel::High,
            "Aggressive SLO requirements",
            "Enable performance monitoring pre/post change",
        );
    }

    if factors.is_empty() {
        factors.push("Standard configuration change".to_string());
        mitigations.push("Follow standard procedures".to_string());
    }

    RiskAssessment {
        level,
        factors,
        mitigations,
    }
}
