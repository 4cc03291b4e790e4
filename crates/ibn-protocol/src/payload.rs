use serde::{Deserialize, Serialize};

use crate::device::{Transport, Vendor};

/// YANG paths one device needs touched to realise an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub device_id: String,
    pub vendor: Vendor,
    pub os_version: String,
    /// Never empty.
    pub yang_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadType {
    Xml,
    Json,
    GnmiSet,
}

/// Fully rendered configuration for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePayload {
    /// Device id of the target.
    pub target: String,
    pub vendor: Vendor,
    pub transport: Transport,
    pub payload_type: PayloadType,
    pub payload: String,
    #[serde(default)]
    pub prechecks: Vec<String>,
    #[serde(default)]
    pub post_validation: Vec<String>,
}
