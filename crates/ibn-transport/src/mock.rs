//! Scriptable mock devices for tests.
//!
//! A [`MockDevice`] models one router: the capabilities and schemas it
//! advertises, a candidate/running datastore pair, injected failures and
//! latency. Every operation is recorded so tests can assert exactly which
//! RPCs were issued and that no session was left open.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ibn_protocol::{Device, ModelRef};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::connector::DeviceConnector;
use crate::error::{TransportError, TransportResult};
use crate::gnmi::{GnmiCapabilities, GnmiModel, GnmiSession, GnmiUpdate, SubscriptionMode};
use crate::netconf::{self, Datastore, DefaultOperation, NetconfSession};
use crate::restconf::RestconfSession;

/// Operations a mock device records (and can be told to fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Connect,
    Hello,
    GetSchema,
    GetConfig,
    EditConfig,
    Validate,
    Commit,
    ConfirmedCommit,
    DiscardChanges,
    Close,
    GnmiCapabilities,
    GnmiGet,
    GnmiSet,
    GnmiSubscribe,
    RestconfModules,
    RestconfGet,
    RestconfWrite,
    RestconfRpc,
}

#[derive(Debug, Default)]
struct Datastores {
    candidate: Option<String>,
    running: Option<String>,
    gnmi: HashMap<String, Value>,
}

/// One scripted device.
pub struct MockDevice {
    capabilities: Vec<String>,
    schemas: HashMap<String, String>,
    gnmi_models: Vec<GnmiModel>,
    restconf_modules: Vec<ModelRef>,
    unreachable: bool,
    failures: HashSet<MockOp>,
    delay: Option<Duration>,
    calls: Mutex<Vec<MockOp>>,
    rpcs: Mutex<Vec<String>>,
    stores: Mutex<Datastores>,
    open_sessions: AtomicUsize,
    message_id: AtomicU64,
}

impl MockDevice {
    /// A reachable device advertising only the NETCONF base capabilities.
    pub fn new() -> Self {
        Self {
            capabilities: vec![
                netconf::CAP_BASE_1_1.to_string(),
                netconf::CAP_CANDIDATE.to_string(),
                netconf::CAP_VALIDATE.to_string(),
                netconf::CAP_CONFIRMED_COMMIT.to_string(),
            ],
            schemas: HashMap::new(),
            gnmi_models: Vec::new(),
            restconf_modules: Vec::new(),
            unreachable: false,
            failures: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            rpcs: Mutex::new(Vec::new()),
            stores: Mutex::new(Datastores::default()),
            open_sessions: AtomicUsize::new(0),
            message_id: AtomicU64::new(0),
        }
    }

    /// Advertise `name@revision` as a NETCONF module capability.
    pub fn with_module(mut self, name: &str, revision: &str) -> Self {
        self.capabilities.push(format!(
            "urn:example:yang:{name}?module={name}&revision={revision}"
        ));
        self
    }

    /// Advertise every `name@revision` in the list.
    pub fn with_models(self, models: &[&str]) -> Self {
        models.iter().fold(self, |dev, m| {
            let r = ModelRef::parse(m);
            dev.with_module(&r.name, r.revision.as_deref().unwrap_or(""))
        })
    }

    /// Make `<get-schema>` for `identifier` return `content`.
    pub fn with_schema(mut self, identifier: &str, content: &str) -> Self {
        self.schemas.insert(identifier.to_string(), content.to_string());
        self
    }

    pub fn with_gnmi_models(mut self, models: &[&str]) -> Self {
        self.gnmi_models = models
            .iter()
            .map(|m| {
                let r = ModelRef::parse(m);
                GnmiModel {
                    name: r.name,
                    organization: "example".into(),
                    version: r.revision.unwrap_or_default(),
                }
            })
            .collect();
        self
    }

    pub fn with_restconf_modules(mut self, models: &[&str]) -> Self {
        self.restconf_modules = models.iter().map(|m| ModelRef::parse(m)).collect();
        self
    }

    /// Every connect attempt fails.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Make the given operation return an RPC error.
    pub fn failing(mut self, op: MockOp) -> Self {
        self.failures.insert(op);
        self
    }

    /// Sleep this long before answering any operation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Operations in the order they were issued.
    pub fn calls(&self) -> Vec<MockOp> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    pub fn called(&self, op: MockOp) -> bool {
        self.count(op) > 0
    }

    /// NETCONF RPC documents that would have gone on the wire.
    pub fn rpcs(&self) -> Vec<String> {
        self.rpcs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sessions opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn running_config(&self) -> Option<String> {
        self.stores.lock().unwrap_or_else(|e| e.into_inner()).running.clone()
    }

    pub fn candidate_config(&self) -> Option<String> {
        self.stores.lock().unwrap_or_else(|e| e.into_inner()).candidate.clone()
    }

    pub fn gnmi_value(&self, path: &str) -> Option<Value> {
        self.stores
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .gnmi
            .get(path)
            .cloned()
    }

    async fn step(&self, op: MockOp) -> TransportResult<()> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(op);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.contains(&op) {
            return Err(TransportError::Rpc(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn record_rpc(&self, render: impl FnOnce(u64) -> String) {
        let id = self.message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rpcs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(render(id));
    }

    fn stores(&self) -> std::sync::MutexGuard<'_, Datastores> {
        self.stores.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn open(self: &Arc<Self>) -> TransportResult<SessionGuard> {
        self.step(MockOp::Connect).await?;
        if self.unreachable {
            return Err(TransportError::Connection("connection refused".into()));
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(SessionGuard {
            device: Arc::clone(self),
        })
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the device's open-session count when the session is dropped.
struct SessionGuard {
    device: Arc<MockDevice>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.device.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── NETCONF ───────────────────────────────────────────────────

struct MockNetconfSession {
    guard: SessionGuard,
}

#[async_trait]
impl NetconfSession for MockNetconfSession {
    async fn get_capabilities(&self) -> TransportResult<Vec<String>> {
        let dev = &self.guard.device;
        dev.step(MockOp::Hello).await?;
        dev.record_rpc(|_| netconf::hello());
        Ok(dev.capabilities.clone())
    }

    async fn get_schema(&self, identifier: &str, version: Option<&str>) -> TransportResult<String> {
        let dev = &self.guard.device;
        dev.step(MockOp::GetSchema).await?;
        dev.record_rpc(|id| netconf::get_schema_rpc(id, identifier, version));
        dev.schemas
            .get(identifier)
            .cloned()
            .ok_or_else(|| TransportError::Rpc(format!("schema {identifier} not available")))
    }

    async fn get_config(&self, source: Datastore, filter: Option<&str>) -> TransportResult<String> {
        let dev = &self.guard.device;
        dev.step(MockOp::GetConfig).await?;
        dev.record_rpc(|id| netconf::get_config_rpc(id, source, filter));
        let stores = dev.stores();
        let body = match source {
            Datastore::Candidate => stores.candidate.clone().or_else(|| stores.running.clone()),
            _ => stores.running.clone(),
        };
        Ok(format!("<data>{}</data>", body.unwrap_or_default()))
    }

    async fn edit_config(
        &self,
        config: &str,
        target: Datastore,
        default_operation: DefaultOperation,
    ) -> TransportResult<()> {
        let dev = &self.guard.device;
        dev.step(MockOp::EditConfig).await?;
        dev.record_rpc(|id| netconf::edit_config_rpc(id, config, target, default_operation));
        dev.stores().candidate = Some(config.to_string());
        Ok(())
    }

    async fn validate(&self, source: Datastore) -> TransportResult<()> {
        let dev = &self.guard.device;
        dev.step(MockOp::Validate).await?;
        dev.record_rpc(|id| netconf::validate_rpc(id, source));
        Ok(())
    }

    async fn commit(&self, confirmed: bool, timeout_secs: Option<u64>) -> TransportResult<()> {
        let dev = &self.guard.device;
        let op = if confirmed {
            MockOp::ConfirmedCommit
        } else {
            MockOp::Commit
        };
        dev.step(op).await?;
        dev.record_rpc(|id| netconf::commit_rpc(id, confirmed, timeout_secs));
        let mut stores = dev.stores();
        if let Some(candidate) = stores.candidate.take() {
            stores.running = Some(candidate);
        }
        Ok(())
    }

    async fn discard_changes(&self) -> TransportResult<()> {
        let dev = &self.guard.device;
        dev.step(MockOp::DiscardChanges).await?;
        dev.record_rpc(netconf::discard_changes_rpc);
        dev.stores().candidate = None;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        let dev = &self.guard.device;
        dev.step(MockOp::Close).await?;
        dev.record_rpc(netconf::close_session_rpc);
        Ok(())
    }
}

// ── gNMI ──────────────────────────────────────────────────────

struct MockGnmiSession {
    guard: SessionGuard,
}

#[async_trait]
impl GnmiSession for MockGnmiSession {
    async fn capabilities(&self) -> TransportResult<GnmiCapabilities> {
        let dev = &self.guard.device;
        dev.step(MockOp::GnmiCapabilities).await?;
        Ok(GnmiCapabilities {
            models: dev.gnmi_models.clone(),
            encodings: vec!["JSON_IETF".into()],
            gnmi_version: "0.8.0".into(),
        })
    }

    async fn get(&self, paths: &[String]) -> TransportResult<serde_json::Map<String, Value>> {
        let dev = &self.guard.device;
        dev.step(MockOp::GnmiGet).await?;
        let stores = dev.stores();
        Ok(paths
            .iter()
            .map(|p| {
                let v = stores.gnmi.get(p).cloned().unwrap_or_else(|| Value::from("UP"));
                (p.clone(), v)
            })
            .collect())
    }

    async fn set(&self, updates: &[GnmiUpdate], deletes: &[String]) -> TransportResult<()> {
        let dev = &self.guard.device;
        dev.step(MockOp::GnmiSet).await?;
        let mut stores = dev.stores();
        for d in deletes {
            stores.gnmi.remove(d);
        }
        for u in updates {
            stores.gnmi.insert(u.path.clone(), u.value.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        paths: &[String],
        _mode: SubscriptionMode,
    ) -> TransportResult<mpsc::Receiver<Value>> {
        let dev = &self.guard.device;
        dev.step(MockOp::GnmiSubscribe).await?;
        let (tx, rx) = mpsc::channel(paths.len().max(1));
        for p in paths {
            let _ = tx.try_send(serde_json::json!({ "path": p, "val": "UP" }));
        }
        Ok(rx)
    }

    async fn close(&self) -> TransportResult<()> {
        self.guard.device.step(MockOp::Close).await
    }
}

// ── RESTCONF ──────────────────────────────────────────────────

struct MockRestconfSession {
    guard: SessionGuard,
}

#[async_trait]
impl RestconfSession for MockRestconfSession {
    async fn get_modules(&self) -> TransportResult<Vec<ModelRef>> {
        let dev = &self.guard.device;
        dev.step(MockOp::RestconfModules).await?;
        Ok(dev.restconf_modules.clone())
    }

    async fn get_config(&self, _path: &str) -> TransportResult<Value> {
        self.guard.device.step(MockOp::RestconfGet).await?;
        Ok(Value::Object(Default::default()))
    }

    async fn put_config(&self, _path: &str, _body: &Value) -> TransportResult<()> {
        self.guard.device.step(MockOp::RestconfWrite).await
    }

    async fn patch_config(&self, _path: &str, _body: &Value) -> TransportResult<()> {
        self.guard.device.step(MockOp::RestconfWrite).await
    }

    async fn post_config(&self, _path: &str, _body: &Value) -> TransportResult<()> {
        self.guard.device.step(MockOp::RestconfWrite).await
    }

    async fn delete_config(&self, _path: &str) -> TransportResult<()> {
        self.guard.device.step(MockOp::RestconfWrite).await
    }

    async fn call_rpc(&self, _name: &str, _input: Option<&Value>) -> TransportResult<Value> {
        self.guard.device.step(MockOp::RestconfRpc).await?;
        Ok(Value::Null)
    }

    async fn close(&self) -> TransportResult<()> {
        self.guard.device.step(MockOp::Close).await
    }
}

// ── Connector ─────────────────────────────────────────────────

/// A fleet of mock devices keyed by device id.
pub struct MockConnector {
    devices: Mutex<HashMap<String, Arc<MockDevice>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Register a device and return a handle for assertions.
    pub fn add(&self, device_id: &str, device: MockDevice) -> Arc<MockDevice> {
        let device = Arc::new(device);
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(device_id.to_string(), Arc::clone(&device));
        device
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<MockDevice>> {
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(device_id)
            .cloned()
    }

    /// Total sessions still open across all devices.
    pub fn open_sessions(&self) -> usize {
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|d| d.open_sessions())
            .sum()
    }

    fn lookup(&self, device: &Device) -> TransportResult<Arc<MockDevice>> {
        self.device(&device.device_id).ok_or_else(|| {
            TransportError::Connection(format!("no route to host {}", device.address()))
        })
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn netconf(&self, device: &Device) -> TransportResult<Box<dyn NetconfSession>> {
        let guard = self.lookup(device)?.open().await?;
        Ok(Box::new(MockNetconfSession { guard }))
    }

    async fn gnmi(&self, device: &Device) -> TransportResult<Box<dyn GnmiSession>> {
        let guard = self.lookup(device)?.open().await?;
        Ok(Box::new(MockGnmiSession { guard }))
    }

    async fn restconf(&self, device: &Device) -> TransportResult<Box<dyn RestconfSession>> {
        let guard = self.lookup(device)?.open().await?;
        Ok(Box::new(MockRestconfSession { guard }))
    }
}
