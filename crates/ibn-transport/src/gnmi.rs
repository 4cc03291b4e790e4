//! gNMI session seam, path handling and the JSON `SetRequest` shape the
//! payload generator emits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};

/// `ModelData` entry of a `CapabilityResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnmiModel {
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnmiCapabilities {
    pub models: Vec<GnmiModel>,
    #[serde(default)]
    pub encodings: Vec<String>,
    #[serde(default)]
    pub gnmi_version: String,
}

/// A leaf update: string path plus decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnmiUpdate {
    pub path: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    Stream,
    Once,
    Poll,
}

/// One open gNMI channel to one device.
#[async_trait]
pub trait GnmiSession: Send + Sync {
    async fn capabilities(&self) -> TransportResult<GnmiCapabilities>;

    /// Values keyed by requested path.
    async fn get(&self, paths: &[String]) -> TransportResult<serde_json::Map<String, serde_json::Value>>;

    async fn set(&self, updates: &[GnmiUpdate], deletes: &[String]) -> TransportResult<()>;

    /// Notifications arrive on the returned channel until the session or
    /// the receiver is dropped.
    async fn subscribe(
        &self,
        paths: &[String],
        mode: SubscriptionMode,
    ) -> TransportResult<mpsc::Receiver<serde_json::Value>>;

    async fn close(&self) -> TransportResult<()>;
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElem {
    pub name: String,
    #[serde(default, rename = "key", skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, String>,
}

/// Structured gNMI path, e.g.
/// `/network-instances/network-instance[name=RED]/config/type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GnmiPath {
    #[serde(default)]
    pub elem: Vec<PathElem>,
}

impl GnmiPath {
    pub fn parse(path: &str) -> TransportResult<Self> {
        let mut elem = Vec::new();
        for segment in split_segments(path.trim())? {
            elem.push(parse_elem(&segment)?);
        }
        Ok(Self { elem })
    }

    /// Concatenate two paths (prefix + relative).
    pub fn join(&self, other: &GnmiPath) -> GnmiPath {
        let mut elem = self.elem.clone();
        elem.extend(other.elem.iter().cloned());
        GnmiPath { elem }
    }
}

impl std::fmt::Display for GnmiPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.elem.is_empty() {
            return f.write_str("/");
        }
        for e in &self.elem {
            write!(f, "/{}", e.name)?;
            for (k, v) in &e.keys {
                write!(f, "[{k}={v}]")?;
            }
        }
        Ok(())
    }
}

fn split_segments(path: &str) -> TransportResult<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in path.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| TransportError::Protocol(format!("unbalanced ']' in path {path}")))?;
                current.push(ch);
            }
            '/' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 {
        return Err(TransportError::Protocol(format!("unbalanced '[' in path {path}")));
    }
    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}

fn parse_elem(segment: &str) -> TransportResult<PathElem> {
    let (name, mut rest) = match segment.find('[') {
        Some(idx) => (&segment[..idx], &segment[idx..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(TransportError::Protocol(format!("empty path element in '{segment}'")));
    }
    let mut keys = BTreeMap::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| TransportError::Protocol(format!("unterminated key in '{segment}'")))?;
        let (k, v) = stripped[..end]
            .split_once('=')
            .ok_or_else(|| TransportError::Protocol(format!("key without '=' in '{segment}'")))?;
        keys.insert(k.to_string(), v.to_string());
        rest = &stripped[end + 1..];
    }
    Ok(PathElem {
        name: name.to_string(),
        keys,
    })
}

// ── SetRequest JSON ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetUpdate {
    pub path: GnmiPath,
    /// gNMI `TypedValue`, e.g. `{"string_val": "L3VRF"}`.
    pub val: serde_json::Value,
}

/// JSON rendering of a gNMI `SetRequest`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<GnmiPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<SetUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<SetUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<GnmiPath>,
}

impl SetRequest {
    /// Parse a payload, rejecting requests that change nothing.
    pub fn parse(payload: &str) -> TransportResult<Self> {
        let req: SetRequest = serde_json::from_str(payload)
            .map_err(|e| TransportError::Protocol(format!("invalid gNMI SetRequest JSON: {e}")))?;
        if req.update.is_empty() && req.replace.is_empty() && req.delete.is_empty() {
            return Err(TransportError::Protocol(
                "gNMI SetRequest has no update, replace or delete".into(),
            ));
        }
        Ok(req)
    }

    fn absolute(&self, path: &GnmiPath) -> GnmiPath {
        match &self.prefix {
            Some(prefix) => prefix.join(path),
            None => path.clone(),
        }
    }

    /// Updates and replaces as absolute string paths with decoded values.
    pub fn updates(&self) -> Vec<GnmiUpdate> {
        self.update
            .iter()
            .chain(self.replace.iter())
            .map(|u| GnmiUpdate {
                path: self.absolute(&u.path).to_string(),
                value: decode_typed_value(&u.val),
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.delete
            .iter()
            .map(|p| self.absolute(p).to_string())
            .collect()
    }
}

/// Unwrap a single-field `TypedValue` (`string_val`, `json_val`, ...).
fn decode_typed_value(val: &serde_json::Value) -> serde_json::Value {
    match val.as_object() {
        Some(map) if map.len() == 1 => match map.iter().next() {
            Some((k, v)) if k.ends_with("_val") => v.clone(),
            _ => val.clone(),
        },
        _ => val.clone(),
    }
}
