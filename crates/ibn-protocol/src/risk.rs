use serde::{Deserialize, Serialize};

/// Ordered risk levels: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Never empty.
    pub factors: Vec<String>,
    /// Never empty.
    pub mitigations: Vec<String>,
}

impl RiskAssessment {
    /// Assessment attached to a pipeline failure.
    pub fn processing_error() -> Self {
        Self {
            level: RiskLevel::High,
            factors: vec!["Processing error encountered".into()],
            mitigations: vec!["Manual review required".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::Low.max(RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn level_wire_names() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), r#""MEDIUM""#);
    }
}
