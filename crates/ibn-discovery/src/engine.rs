//! Per-device model discovery.
//!
//! Each device is probed over the first enabled transport, in the order
//! NETCONF, gNMI, RESTCONF. A device with no live transport is resolved from
//! the cache and schema repositories; so is a device whose live probe fails,
//! in which case the result is marked `repository-fallback`.

use std::collections::BTreeSet;
use std::sync::Arc;

use ibn_protocol::{
    Device, DiscoverySource, ModelDiscoveryResult, ModelRef, NormalizedIntent, ServiceType,
    Transport, Vendor,
};
use ibn_transport::netconf::parse_capability;
use ibn_transport::{
    Cancellation, DeviceConnector, GnmiSession, NetconfSession, RestconfSession, TransportResult,
    with_timeout,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{ModelCache, YangModel};
use crate::config::DiscoveryConfig;
use crate::repository::SchemaRepository;
use crate::requirements::required_models;

/// What a live probe learned before it is turned into a result.
struct LiveModels {
    found: BTreeSet<String>,
    gaps: BTreeSet<String>,
}

/// Discovers supported YANG models for a whole inventory.
#[derive(Clone)]
pub struct ModelDiscovery {
    connector: Arc<dyn DeviceConnector>,
    cache: Arc<ModelCache>,
    repository: Arc<dyn SchemaRepository>,
    config: DiscoveryConfig,
}

impl ModelDiscovery {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        cache: Arc<ModelCache>,
        repository: Arc<dyn SchemaRepository>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            connector,
            cache,
            repository,
            config,
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// One result per device, in inventory order.
    pub async fn discover(
        &self,
        inventory: &[Device],
        intent: &NormalizedIntent,
    ) -> Vec<ModelDiscoveryResult> {
        self.discover_with_cancel(inventory, intent, &Cancellation::new())
            .await
    }

    /// Like [`discover`](Self::discover), but stops waiting once `cancel`
    /// fires. Devices whose probe had not finished get a result describing
    /// the incomplete discovery.
    pub async fn discover_with_cancel(
        &self,
        inventory: &[Device],
        intent: &NormalizedIntent,
        cancel: &Cancellation,
    ) -> Vec<ModelDiscoveryResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let service = intent.service_type;
        let mut tasks = JoinSet::new();

        for (idx, device) in inventory.iter().cloned().enumerate() {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (idx, engine.discover_device(&device, service).await)
            });
        }

        let mut slots: Vec<Option<ModelDiscoveryResult>> = vec![None; inventory.len()];
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((idx, result))) => slots[idx] = Some(result),
                    Some(Err(e)) => tracing::error!(error = %e, "discovery task failed"),
                    None => break,
                },
                _ = cancel.cancelled() => {
                    tracing::warn!(pending = tasks.len(), "model discovery cancelled");
                    tasks.abort_all();
                    break;
                }
            }
        }

        inventory
            .iter()
            .zip(slots)
            .map(|(device, slot)| slot.unwrap_or_else(|| incomplete(device)))
            .collect()
    }

    /// Discover a single device. Never fails: transport problems end up as
    /// a repository fallback, missing models as gaps.
    pub async fn discover_device(
        &self,
        device: &Device,
        service: ServiceType,
    ) -> ModelDiscoveryResult {
        let required = required_models(service, device.vendor);
        let timeout = self.config.probe_timeout();

        let live = if device.netconf_enabled {
            Some((
                Transport::Netconf,
                DiscoverySource::OnDeviceNetconf,
                with_timeout("netconf discovery", timeout, self.probe_netconf(device, &required))
                    .await,
            ))
        } else if device.gnmi_enabled {
            Some((
                Transport::Gnmi,
                DiscoverySource::OnDeviceGnmi,
                with_timeout("gnmi discovery", timeout, self.probe_gnmi(device, &required)).await,
            ))
        } else if device.restconf_enabled {
            Some((
                Transport::Restconf,
                DiscoverySource::OnDeviceRestconf,
                with_timeout("restconf discovery", timeout, self.probe_restconf(device)).await,
            ))
        } else {
            None
        };

        match live {
            Some((transport, source, Ok(models))) => {
                tracing::debug!(
                    device = %device.device_id,
                    %transport,
                    found = models.found.len(),
                    gaps = models.gaps.len(),
                    "live discovery complete"
                );
                let mut result = ModelDiscoveryResult::new(&device.device_id, transport, source);
                result.models_found = models.found;
                result.gaps = models.gaps;
                result
            }
            Some((transport, _, Err(e))) => {
                tracing::warn!(
                    device = %device.device_id,
                    %transport,
                    error = %e,
                    "live discovery failed, falling back to repositories"
                );
                self.resolve_from_repositories(
                    device,
                    &required,
                    transport,
                    DiscoverySource::RepositoryFallback,
                )
                .await
            }
            None => {
                self.resolve_from_repositories(
                    device,
                    &required,
                    device.config_transport(),
                    DiscoverySource::Repository,
                )
                .await
            }
        }
    }

    async fn probe_netconf(
        &self,
        device: &Device,
        required: &[ModelRef],
    ) -> TransportResult<LiveModels> {
        let session = self.connector.netconf(device).await?;
        let outcome = self.netconf_models(session.as_ref(), device, required).await;
        if let Err(e) = session.close().await {
            tracing::debug!(device = %device.device_id, error = %e, "netconf close failed");
        }
        outcome
    }

    async fn netconf_models(
        &self,
        session: &dyn NetconfSession,
        device: &Device,
        required: &[ModelRef],
    ) -> TransportResult<LiveModels> {
        let capabilities = session.get_capabilities().await?;
        let mut found: BTreeSet<String> = capabilities
            .iter()
            .filter_map(|uri| parse_capability(uri))
            .map(|m| m.to_string())
            .collect();
        let mut gaps = BTreeSet::new();

        for model in required {
            if contains_module(&found, &model.name) {
                continue;
            }
            match session
                .get_schema(&model.name, model.revision.as_deref())
                .await
            {
                Ok(content) => {
                    found.insert(model.to_string());
                    self.store(device.vendor, model, "netconf", content);
                }
                Err(e) => {
                    tracing::debug!(device = %device.device_id, model = %model, error = %e, "get-schema failed");
                    gaps.insert(format!("Schema not available: {model}"));
                }
            }
        }
        Ok(LiveModels { found, gaps })
    }

    async fn probe_gnmi(
        &self,
        device: &Device,
        required: &[ModelRef],
    ) -> TransportResult<LiveModels> {
        let session = self.connector.gnmi(device).await?;
        let outcome = gnmi_models(session.as_ref(), required).await;
        if let Err(e) = session.close().await {
            tracing::debug!(device = %device.device_id, error = %e, "gnmi close failed");
        }
        outcome
    }

    async fn probe_restconf(&self, device: &Device) -> TransportResult<LiveModels> {
        let session = self.connector.restconf(device).await?;
        let outcome = restconf_models(session.as_ref()).await;
        if let Err(e) = session.close().await {
            tracing::debug!(device = %device.device_id, error = %e, "restconf close failed");
        }
        outcome
    }

    async fn resolve_from_repositories(
        &self,
        device: &Device,
        required: &[ModelRef],
        transport: Transport,
        source: DiscoverySource,
    ) -> ModelDiscoveryResult {
        let mut result = ModelDiscoveryResult::new(&device.device_id, transport, source);
        for model in required {
            if self.resolve_model(model, device.vendor).await {
                result.models_found.insert(model.to_string());
            } else {
                result
                    .gaps
                    .insert(format!("Model not found in repositories: {model}"));
            }
        }
        result
    }

    /// Cache first, then the repositories with write-through on a hit.
    async fn resolve_model(&self, model: &ModelRef, vendor: Vendor) -> bool {
        let key = ModelCache::key(vendor, model);
        if self.cache.get(&key).is_some() {
            tracing::debug!(key, "model cache hit");
            return true;
        }
        match self.repository.fetch(model, vendor).await {
            Some(fetched) => {
                self.store(vendor, model, &fetched.url, fetched.content);
                true
            }
            None => false,
        }
    }

    fn store(&self, vendor: Vendor, model: &ModelRef, source: &str, content: String) {
        let key = ModelCache::key(vendor, model);
        if let Err(e) = self
            .cache
            .put(&key, YangModel::from_content(model, source, content))
        {
            tracing::warn!(key, error = %e, "failed to cache model");
        }
    }
}

async fn gnmi_models(
    session: &dyn GnmiSession,
    required: &[ModelRef],
) -> TransportResult<LiveModels> {
    let capabilities = session.capabilities().await?;
    let found: BTreeSet<String> = capabilities
        .models
        .iter()
        .map(|m| {
            if m.version.is_empty() {
                m.name.clone()
            } else {
                format!("{}@{}", m.name, m.version)
            }
        })
        .collect();
    let gaps = required
        .iter()
        .filter(|model| !contains_module(&found, &model.name))
        .map(|model| format!("Required model not supported: {model}"))
        .collect();
    Ok(LiveModels { found, gaps })
}

async fn restconf_models(session: &dyn RestconfSession) -> TransportResult<LiveModels> {
    let found = session
        .get_modules()
        .await?
        .iter()
        .map(|m| m.to_string())
        .collect();
    Ok(LiveModels {
        found,
        gaps: BTreeSet::new(),
    })
}

fn contains_module(found: &BTreeSet<String>, name: &str) -> bool {
    found.iter().any(|m| ModelRef::parse(m).name == name)
}

fn incomplete(device: &Device) -> ModelDiscoveryResult {
    let mut result = ModelDiscoveryResult::new(
        &device.device_id,
        device.config_transport(),
        DiscoverySource::Repository,
    );
    result.gaps.insert(format!(
        "Discovery did not complete for {}",
        device.device_id
    ));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ibn_protocol::{Endpoint, IntentPolicy, ServiceAttributes};
    use ibn_transport::{MockConnector, MockDevice, MockOp};

    use crate::repository::InMemorySchemaRepository;

    const L3VPN_GENERIC: &[&str] = &[
        "ietf-l3vpn-svc@2018-01-19",
        "ietf-network-instance@2019-01-21",
        "openconfig-network-instance@2021-08-24",
    ];

    fn intent(service_type: ServiceType) -> NormalizedIntent {
        NormalizedIntent {
            service_type,
            endpoints: vec![Endpoint::auto_discovered()],
            routing: None,
            slo: None,
            policy: IntentPolicy::default(),
            attributes: ServiceAttributes::default(),
        }
    }

    struct Fixture {
        connector: Arc<MockConnector>,
        repository: Arc<InMemorySchemaRepository>,
        engine: ModelDiscovery,
        _dir: tempfile::TempDir,
    }

    fn fixture(repository: InMemorySchemaRepository, config: DiscoveryConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ModelCache::open(dir.path(), config.cache_max_age()).unwrap());
        let connector = Arc::new(MockConnector::new());
        let repository = Arc::new(repository);
        let engine = ModelDiscovery::new(
            connector.clone(),
            cache,
            repository.clone(),
            config,
        );
        Fixture {
            connector,
            repository,
            engine,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn netconf_device_with_all_models_has_no_gaps() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        let dev = fx
            .connector
            .add("PE1", MockDevice::new().with_models(L3VPN_GENERIC));

        let device = Device::new("PE1", Vendor::Generic);
        let results = fx.engine.discover(&[device], &intent(ServiceType::L3vpn)).await;

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.source, DiscoverySource::OnDeviceNetconf);
        assert_eq!(r.transport, Transport::Netconf);
        assert!(r.gaps.is_empty(), "gaps: {:?}", r.gaps);
        assert!(r.models_found.contains("ietf-l3vpn-svc@2018-01-19"));
        assert!(!dev.called(MockOp::GetSchema));
        assert!(dev.called(MockOp::Close));
        assert_eq!(dev.open_sessions(), 0);
    }

    #[tokio::test]
    async fn netconf_fetches_missing_schema_and_caches_it() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        fx.connector.add(
            "PE1",
            MockDevice::new()
                .with_models(&L3VPN_GENERIC[..2])
                .with_schema(
                    "openconfig-network-instance",
                    "module openconfig-network-instance { namespace \"http://openconfig.net/yang/network-instance\"; }",
                ),
        );

        let results = fx
            .engine
            .discover(&[Device::new("PE1", Vendor::Generic)], &intent(ServiceType::L3vpn))
            .await;

        let r = &results[0];
        assert!(r.gaps.is_empty());
        assert!(r.has_module("openconfig-network-instance"));
        let key = ModelCache::key(
            Vendor::Generic,
            &ModelRef::parse("openconfig-network-instance@2021-08-24"),
        );
        let cached = fx.engine.cache().get(&key).unwrap();
        assert_eq!(cached.source, "netconf");
        assert_eq!(cached.namespace, "http://openconfig.net/yang/network-instance");
    }

    #[tokio::test]
    async fn netconf_schema_failure_is_a_gap() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        fx.connector
            .add("PE1", MockDevice::new().with_models(&L3VPN_GENERIC[..2]));

        let results = fx
            .engine
            .discover(&[Device::new("PE1", Vendor::Generic)], &intent(ServiceType::L3vpn))
            .await;

        let r = &results[0];
        assert_eq!(r.source, DiscoverySource::OnDeviceNetconf);
        assert_eq!(
            r.gaps.iter().collect::<Vec<_>>(),
            vec!["Schema not available: openconfig-network-instance@2021-08-24"]
        );
    }

    #[tokio::test]
    async fn unreachable_device_falls_back_to_repositories() {
        let repo = InMemorySchemaRepository::new().with_models(&L3VPN_GENERIC[..1]);
        let fx = fixture(repo, DiscoveryConfig::default());
        fx.connector.add("PE1", MockDevice::new().unreachable());

        let results = fx
            .engine
            .discover(&[Device::new("PE1", Vendor::Generic)], &intent(ServiceType::L3vpn))
            .await;

        let r = &results[0];
        assert_eq!(r.source, DiscoverySource::RepositoryFallback);
        assert_eq!(r.transport, Transport::Netconf);
        assert!(r.models_found.contains("ietf-l3vpn-svc@2018-01-19"));
        assert_eq!(r.gaps.len(), 2);
        assert!(
            r.gaps
                .contains("Model not found in repositories: ietf-network-instance@2019-01-21")
        );
        // Connection errors are logged, never reported as gaps.
        assert!(!r.gaps.iter().any(|g| g.contains("refused")));
    }

    #[tokio::test]
    async fn gnmi_reports_unsupported_models() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        fx.connector.add(
            "LEAF1",
            MockDevice::new().with_gnmi_models(&["openconfig-bgp@2021-08-06"]),
        );
        let device = Device::new("LEAF1", Vendor::Arista).with_transports(false, true, false);

        let results = fx.engine.discover(&[device], &intent(ServiceType::Bgp)).await;

        let r = &results[0];
        assert_eq!(r.source, DiscoverySource::OnDeviceGnmi);
        assert_eq!(r.transport, Transport::Gnmi);
        assert!(r.models_found.contains("openconfig-bgp@2021-08-06"));
        assert_eq!(
            r.gaps.iter().collect::<Vec<_>>(),
            vec!["Required model not supported: ietf-bgp@2019-03-21"]
        );
    }

    #[tokio::test]
    async fn restconf_records_yang_library() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        fx.connector.add(
            "CE1",
            MockDevice::new()
                .with_restconf_modules(&["ietf-interfaces@2018-02-20", "ietf-ip@2018-02-22"]),
        );
        let device = Device::new("CE1", Vendor::Huawei).with_transports(false, false, true);

        let results = fx.engine.discover(&[device], &intent(ServiceType::Bgp)).await;

        let r = &results[0];
        assert_eq!(r.source, DiscoverySource::OnDeviceRestconf);
        assert_eq!(r.models_found.len(), 2);
        assert!(r.gaps.is_empty());
    }

    #[tokio::test]
    async fn offline_device_uses_cache_on_second_run() {
        let repo = InMemorySchemaRepository::new().with_models(&[
            "ietf-bgp@2019-03-21",
            "openconfig-bgp@2021-08-06",
        ]);
        let fx = fixture(repo, DiscoveryConfig::default());
        let device = Device::new("P1", Vendor::Juniper).with_transports(false, false, false);
        let bgp = intent(ServiceType::Bgp);

        let first = fx.engine.discover(std::slice::from_ref(&device), &bgp).await;
        assert_eq!(first[0].source, DiscoverySource::Repository);
        assert!(first[0].gaps.is_empty());
        assert_eq!(fx.repository.fetch_count(), 2);

        let second = fx.engine.discover(&[device], &bgp).await;
        assert_eq!(second[0].models_found, first[0].models_found);
        assert_eq!(fx.repository.fetch_count(), 2);
        assert_eq!(fx.connector.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out_into_fallback() {
        let config = DiscoveryConfig {
            probe_timeout_secs: 5,
            ..DiscoveryConfig::default()
        };
        let fx = fixture(InMemorySchemaRepository::new(), config);
        let dev = fx
            .connector
            .add("PE1", MockDevice::new().with_delay(Duration::from_secs(60)));

        let results = fx
            .engine
            .discover(&[Device::new("PE1", Vendor::Generic)], &intent(ServiceType::L3vpn))
            .await;

        assert_eq!(results[0].source, DiscoverySource::RepositoryFallback);
        assert_eq!(results[0].gaps.len(), 3);
        assert_eq!(dev.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_inventory_order_under_bounded_concurrency() {
        let config = DiscoveryConfig {
            max_concurrency: 3,
            ..DiscoveryConfig::default()
        };
        let fx = fixture(InMemorySchemaRepository::new(), config);
        let mut inventory = Vec::new();
        for i in 0..10u64 {
            let id = format!("PE{i}");
            // Later devices answer faster so completion order is reversed.
            fx.connector.add(
                &id,
                MockDevice::new()
                    .with_models(L3VPN_GENERIC)
                    .with_delay(Duration::from_millis(100 * (10 - i))),
            );
            inventory.push(Device::new(id, Vendor::Generic));
        }

        let results = fx.engine.discover(&inventory, &intent(ServiceType::L3vpn)).await;

        let targets: Vec<_> = results.iter().map(|r| r.target.clone()).collect();
        let expected: Vec<_> = (0..10).map(|i| format!("PE{i}")).collect();
        assert_eq!(targets, expected);
        assert!(results.iter().all(|r| r.gaps.is_empty()));
        assert_eq!(fx.connector.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_marks_pending_devices_incomplete() {
        let fx = fixture(InMemorySchemaRepository::new(), DiscoveryConfig::default());
        fx.connector.add(
            "PE1",
            MockDevice::new().with_delay(Duration::from_secs(20)),
        );
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let results = fx
            .engine
            .discover_with_cancel(
                &[Device::new("PE1", Vendor::Generic)],
                &intent(ServiceType::L3vpn),
                &cancel,
            )
            .await;

        assert_eq!(results.len(), 1);
        assert!(
            results[0]
                .gaps
                .contains("Discovery did not complete for PE1")
        );
    }
}
