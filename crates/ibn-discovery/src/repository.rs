//! Remote YANG schema repositories.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ibn_protocol::{ModelRef, Vendor};
use serde::Deserialize;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Module text plus the URL that served it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSchema {
    pub content: String,
    pub url: String,
}

/// Source of YANG module text when the device cannot provide it.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// First successful fetch across the configured repositories, or `None`.
    async fn fetch(&self, model: &ModelRef, vendor: Vendor) -> Option<FetchedSchema>;
}

/// A named repository base URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryUrl {
    pub name: String,
    pub url: String,
}

impl RepositoryUrl {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Repository base URLs.
///
/// Vendor repositories are tried first (`{base}/{name}.yang`), then the
/// standard ones (`{base}/modules/{name}.yang`), each in list order.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_standard")]
    pub standard: Vec<RepositoryUrl>,
    /// Vendor name → OS variant repositories.
    #[serde(default = "default_vendor")]
    pub vendor: BTreeMap<String, Vec<RepositoryUrl>>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_standard() -> Vec<RepositoryUrl> {
    vec![
        RepositoryUrl::new("openconfig", "https://raw.githubusercontent.com/openconfig/public/master"),
        RepositoryUrl::new("ietf", "https://raw.githubusercontent.com/YangModels/yang/main/standard/ietf"),
        RepositoryUrl::new("ieee", "https://raw.githubusercontent.com/YangModels/yang/main/standard/ieee"),
    ]
}

fn default_vendor() -> BTreeMap<String, Vec<RepositoryUrl>> {
    let table: &[(&str, &[(&str, &str)])] = &[
        (
            "cisco",
            &[
                ("ios-xr", "https://raw.githubusercontent.com/YangModels/yang/main/vendor/cisco/xr"),
                ("ios-xe", "https://raw.githubusercontent.com/YangModels/yang/main/vendor/cisco/xe"),
                ("nx-os", "https://raw.githubusercontent.com/YangModels/yang/main/vendor/cisco/nx"),
            ],
        ),
        (
            "nokia",
            &[("sr-os", "https://raw.githubusercontent.com/nokia/7x50_YangModels/master")],
        ),
        (
            "juniper",
            &[("junos", "https://raw.githubusercontent.com/Juniper/yang/master")],
        ),
        (
            "arista",
            &[("eos", "https://raw.githubusercontent.com/aristanetworks/yang/master")],
        ),
        (
            "huawei",
            &[("vrp", "https://raw.githubusercontent.com/Huawei/yang/master")],
        ),
    ];
    table
        .iter()
        .map(|(vendor, variants)| {
            let repos = variants
                .iter()
                .map(|(os, url)| RepositoryUrl::new(os, url))
                .collect();
            (vendor.to_string(), repos)
        })
        .collect()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            standard: default_standard(),
            vendor: default_vendor(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl RepositoryConfig {
    /// URLs to try for `model`, in trial order.
    pub fn candidate_urls(&self, model: &ModelRef, vendor: Vendor) -> Vec<String> {
        let name = &model.name;
        let vendor_urls = self
            .vendor
            .get(vendor.as_str())
            .into_iter()
            .flatten()
            .map(|repo| format!("{}/{}.yang", repo.url.trim_end_matches('/'), name));
        let standard_urls = self
            .standard
            .iter()
            .map(|repo| format!("{}/modules/{}.yang", repo.url.trim_end_matches('/'), name));
        vendor_urls.chain(standard_urls).collect()
    }
}

/// Fetches module text over HTTP(S).
pub struct HttpSchemaRepository {
    client: reqwest::Client,
    config: RepositoryConfig,
}

impl HttpSchemaRepository {
    pub fn new(config: RepositoryConfig) -> DiscoveryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| DiscoveryError::Repository(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SchemaRepository for HttpSchemaRepository {
    async fn fetch(&self, model: &ModelRef, vendor: Vendor) -> Option<FetchedSchema> {
        for url in self.config.candidate_urls(model, vendor) {
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(content) => {
                        tracing::debug!(model = %model, url = %url, "schema fetched");
                        return Some(FetchedSchema { content, url });
                    }
                    Err(e) => tracing::debug!(url = %url, error = %e, "schema body read failed"),
                },
                Ok(resp) => tracing::debug!(url = %url, status = %resp.status(), "schema not found"),
                Err(e) => tracing::debug!(url = %url, error = %e, "schema fetch failed"),
            }
        }
        None
    }
}

/// Fixed set of module texts keyed by module name.
///
/// Serves air-gapped controllers that ship a schema bundle, and tests.
#[derive(Default)]
pub struct InMemorySchemaRepository {
    schemas: BTreeMap<String, String>,
    fetches: AtomicUsize,
}

impl InMemorySchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, name: &str, content: &str) -> Self {
        self.schemas.insert(name.to_string(), content.to_string());
        self
    }

    /// Builds a repository holding a placeholder module for each `name@rev`.
    pub fn with_models(mut self, models: &[&str]) -> Self {
        for entry in models {
            let model = ModelRef::parse(entry);
            let content = format!("module {} {{\n  namespace \"urn:{}\";\n}}\n", model.name, model.name);
            self.schemas.insert(model.name, content);
        }
        self
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaRepository for InMemorySchemaRepository {
    async fn fetch(&self, model: &ModelRef, _vendor: Vendor) -> Option<FetchedSchema> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.schemas.get(&model.name).map(|content| FetchedSchema {
            content: content.clone(),
            url: format!("memory:{}", model.name),
        })
    }
}
