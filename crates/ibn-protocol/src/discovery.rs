use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::device::Transport;

/// A YANG module reference, rendered as `name@revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl ModelRef {
    pub fn new(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: Some(revision.into()),
        }
    }

    /// Parse `name@revision` or a bare `name`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('@') {
            Some((name, rev)) if !rev.is_empty() => Self {
                name: name.to_string(),
                revision: Some(rev.to_string()),
            },
            Some((name, _)) => Self {
                name: name.to_string(),
                revision: None,
            },
            None => Self {
                name: s.to_string(),
                revision: None,
            },
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}@{}", self.name, rev),
            None => f.write_str(&self.name),
        }
    }
}

/// Where the discovered model list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    OnDeviceNetconf,
    OnDeviceGnmi,
    OnDeviceRestconf,
    Repository,
    /// A live probe failed and the repository answered instead.
    RepositoryFallback,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnDeviceNetconf => "on-device-netconf",
            Self::OnDeviceGnmi => "on-device-gnmi",
            Self::OnDeviceRestconf => "on-device-restconf",
            Self::Repository => "repository",
            Self::RepositoryFallback => "repository-fallback",
        }
    }
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device outcome of model discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDiscoveryResult {
    pub target: String,
    pub transport: Transport,
    /// `name@revision` strings.
    pub models_found: BTreeSet<String>,
    pub source: DiscoverySource,
    /// Human-readable descriptions of required models that could not be
    /// confirmed. Non-empty whenever any required model is missing.
    pub gaps: BTreeSet<String>,
}

impl ModelDiscoveryResult {
    pub fn new(target: impl Into<String>, transport: Transport, source: DiscoverySource) -> Self {
        Self {
            target: target.into(),
            transport,
            models_found: BTreeSet::new(),
            source,
            gaps: BTreeSet::new(),
        }
    }

    /// True when a model with this module name was found, at any revision.
    pub fn has_module(&self, module: &str) -> bool {
        self.models_found
            .iter()
            .any(|m| ModelRef::parse(m).name == module)
    }
}
