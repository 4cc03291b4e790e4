//! On-disk YANG model cache.
//!
//! Layout under the cache directory:
//! - `models.json`: index mapping cache key to [`YangModel`]
//! - `<key>.yang`: module source; its mtime decides freshness
//!
//! Keys are `<vendor>_<name@revision>`. Both files are replaced atomically
//! (temp file + rename) and index updates are serialised by a mutex, so the
//! index stays consistent under concurrent writers.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, SystemTime};

use ibn_protocol::{ModelRef, Vendor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{DiscoveryError, DiscoveryResult};

pub const INDEX_FILE: &str = "models.json";

static RE_NAMESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"namespace\s+"([^"]+)"\s*;"#).unwrap());

static RE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([A-Za-z0-9_.\-]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YangModel {
    pub name: String,
    pub revision: String,
    #[serde(default)]
    pub namespace: String,
    /// Where the content came from (`repository`, `netconf`, URL).
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// SHA-256 hex of `content`.
    pub checksum: String,
}

impl YangModel {
    /// Build a cache record from module text, deriving namespace, imports
    /// and checksum.
    pub fn from_content(model: &ModelRef, source: impl Into<String>, content: String) -> Self {
        let namespace = RE_NAMESPACE
            .captures(&content)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let dependencies = RE_IMPORT
            .captures_iter(&content)
            .map(|c| c[1].to_string())
            .collect();
        Self {
            name: model.name.clone(),
            revision: model.revision.clone().unwrap_or_else(|| "unknown".into()),
            namespace,
            source: source.into(),
            checksum: sha256_hex(&content),
            content,
            dependencies,
        }
    }

    pub fn checksum_ok(&self) -> bool {
        sha256_hex(&self.content) == self.checksum
    }
}

pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Filesystem-backed model cache with a max-age freshness policy.
pub struct ModelCache {
    dir: PathBuf,
    max_age: Duration,
    index: Mutex<BTreeMap<String, YangModel>>,
}

impl ModelCache {
    /// Open (or create) a cache rooted at `dir`. An unreadable index is
    /// logged and replaced by an empty one.
    pub fn open(dir: impl AsRef<Path>, max_age: Duration) -> DiscoveryResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let index_path = dir.join(INDEX_FILE);
        let index = match fs::read_to_string(&index_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %index_path.display(), error = %e, "model cache index unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            dir,
            max_age,
            index: Mutex::new(index),
        })
    }

    /// Cache key for a vendor/model pair.
    pub fn key(vendor: Vendor, model: &ModelRef) -> String {
        format!("{}_{}", vendor.as_str(), model).replace(['/', '\\'], "_")
    }

    fn content_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.yang"))
    }

    /// Stale when the content file is missing or older than `max_age`.
    pub fn is_expired(&self, key: &str) -> bool {
        let modified = fs::metadata(self.content_path(key)).and_then(|m| m.modified());
        match modified {
            Ok(mtime) => SystemTime::now()
                .duration_since(mtime)
                .map(|age| age >= self.max_age)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    /// A fresh, checksum-valid entry, if any.
    pub fn get(&self, key: &str) -> Option<YangModel> {
        if self.is_expired(key) {
            return None;
        }
        let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        let model = index.get(key)?;
        if !model.checksum_ok() {
            tracing::warn!(key, "cached model checksum mismatch, ignoring entry");
            return None;
        }
        Some(model.clone())
    }

    /// Write-through insert: content file first, then the index.
    pub fn put(&self, key: &str, model: YangModel) -> DiscoveryResult<()> {
        let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        self.write_atomic(&self.content_path(key), model.content.as_bytes())?;
        index.insert(key.to_string(), model);
        let raw = serde_json::to_vec_pretty(&*index)
            .map_err(|e| DiscoveryError::Index(e.to_string()))?;
        self.write_atomic(&self.dir.join(INDEX_FILE), &raw)?;
        tracing::debug!(key, "model cached");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> DiscoveryResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BGP_YANG: &str = r#"module ietf-bgp {
  yang-version 1.1;
  namespace "urn:ietf:params:xml:ns:yang:ietf-bgp";
  prefix bgp;
  import ietf-routing { prefix rt; }
  import ietf-inet-types { prefix inet; }
}"#;

    fn bgp_model() -> YangModel {
        YangModel::from_content(
            &ModelRef::parse("ietf-bgp@2019-03-21"),
            "repository",
            BGP_YANG.to_string(),
        )
    }

    #[test]
    fn model_metadata_is_derived_from_content() {
        let m = bgp_model();
        assert_eq!(m.namespace, "urn:ietf:params:xml:ns:yang:ietf-bgp");
        assert_eq!(m.dependencies, vec!["ietf-routing", "ietf-inet-types"]);
        assert_eq!(m.revision, "2019-03-21");
        assert_eq!(m.checksum.len(), 64);
        assert!(m.checksum_ok());
    }

    #[test]
    fn put_then_get_while_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::open(dir.path(), Duration::from_secs(7 * 86_400)).unwrap();
        let key = ModelCache::key(Vendor::Cisco, &ModelRef::parse("ietf-bgp@2019-03-21"));
        assert_eq!(key, "cisco_ietf-bgp@2019-03-21");

        assert!(cache.get(&key).is_none());
        cache.put(&key, bgp_model()).unwrap();
        assert_eq!(cache.get(&key).unwrap().name, "ietf-bgp");
        assert!(dir.path().join("models.json").exists());
        assert!(dir.path().join(format!("{key}.yang")).exists());
    }

    #[test]
    fn zero_max_age_is_always_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::open(dir.path(), Duration::ZERO).unwrap();
        cache.put("nokia_ietf-bgp@2019-03-21", bgp_model()).unwrap();
        assert!(cache.is_expired("nokia_ietf-bgp@2019-03-21"));
        assert!(cache.get("nokia_ietf-bgp@2019-03-21").is_none());
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let max_age = Duration::from_secs(3600);
        {
            let cache = ModelCache::open(dir.path(), max_age).unwrap();
            cache.put("juniper_ietf-bgp@2019-03-21", bgp_model()).unwrap();
        }
        let reopened = ModelCache::open(dir.path(), max_age).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("juniper_ietf-bgp@2019-03-21").is_some());
    }

    #[test]
    fn corrupt_index_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();
        let cache = ModelCache::open(dir.path(), Duration::from_secs(60)).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn tampered_content_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::open(dir.path(), Duration::from_secs(60)).unwrap();
        let mut model = bgp_model();
        model.checksum = "0".repeat(64);
        cache.put("generic_ietf-bgp@2019-03-21", model).unwrap();
        assert!(cache.get("generic_ietf-bgp@2019-03-21").is_none());
    }

    #[test]
    fn concurrent_writers_keep_index_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(
            ModelCache::open(dir.path(), Duration::from_secs(3600)).unwrap(),
        );
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.put(&format!("generic_m{i}@2020-01-01"), bgp_model()).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let reopened = ModelCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(reopened.len(), 8);
    }
}
