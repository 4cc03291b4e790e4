//! Validation & commit engine.
//!
//! Every call fans out across devices (one task per payload or target) and
//! returns one result per input, in input order. Within a device the
//! lifecycle is strictly sequential and tracked by a [`Lifecycle`]; when a
//! device call fails or is cancelled with uncommitted candidate changes,
//! those changes are discarded before the session closes.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use ibn_protocol::{
    CandidatePayload, CommitResult, ConfigOperation, Device, StepOutcome, Transport,
    ValidationResult, Vendor,
};
use ibn_transport::{
    Cancellation, Datastore, DefaultOperation, DeviceConnector, GnmiSession, NetconfSession,
    SetRequest, TransportError, TransportResult, with_timeout,
};
use serde_json::json;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::config::CommitConfig;
use crate::error::{CommitError, EngineResult};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::registry::{ActiveCommit, CommitRegistry};

/// Commit id reported for gNMI, which applies changes immediately.
pub const GNMI_IMMEDIATE: &str = "gnmi_immediate";
pub const ROLLBACK_ID: &str = "rollback";

/// Device operations run by one engine call, each under the operation
/// timeout and recorded with its duration.
struct Steps {
    timeout: Duration,
    outcomes: Vec<StepOutcome>,
}

impl Steps {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            outcomes: Vec::new(),
        }
    }

    async fn run<T>(
        &mut self,
        operation: ConfigOperation,
        fut: impl Future<Output = TransportResult<T>>,
    ) -> TransportResult<T> {
        let started = Instant::now();
        let result = with_timeout(operation_name(operation), self.timeout, fut).await;
        self.outcomes.push(StepOutcome {
            operation,
            success: result.is_ok(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            detail: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }
}

fn operation_name(operation: ConfigOperation) -> &'static str {
    match operation {
        ConfigOperation::EditConfig => "edit-config",
        ConfigOperation::Validate => "validate",
        ConfigOperation::Commit => "commit",
        ConfigOperation::DiscardChanges => "discard-changes",
        ConfigOperation::GnmiSet => "gnmi set",
        ConfigOperation::RestconfPatch => "restconf patch",
        ConfigOperation::SyntaxCheck => "syntax check",
        ConfigOperation::TelemetryQuery => "telemetry query",
    }
}

#[derive(Clone)]
pub struct CommitEngine {
    connector: Arc<dyn DeviceConnector>,
    registry: Arc<CommitRegistry>,
    devices: Arc<RwLock<HashMap<String, Device>>>,
    config: CommitConfig,
    cancel: Cancellation,
}

impl CommitEngine {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        registry: Arc<CommitRegistry>,
        config: CommitConfig,
    ) -> Self {
        Self {
            connector,
            registry,
            devices: Arc::new(RwLock::new(HashMap::new())),
            config,
            cancel: Cancellation::new(),
        }
    }

    /// Abort in-flight device work when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<CommitRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Make connection details (address, ports, credentials) known for
    /// these devices. Targets never registered are reached by device id.
    pub fn register_devices(&self, devices: &[Device]) {
        let mut known = self.devices.write().unwrap_or_else(|e| e.into_inner());
        for device in devices {
            known.insert(device.device_id.clone(), device.clone());
        }
    }

    fn device_for(&self, target: &str, vendor: Vendor) -> Device {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(target)
            .cloned()
            .unwrap_or_else(|| Device::new(target, vendor))
    }

    /// Run `work` once per item concurrently; slot `i` holds item `i`'s
    /// output, or `None` when its task died.
    async fn fan_out<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> Vec<Option<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(CommitEngine, I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let count = items.len();
        let mut tasks = JoinSet::new();
        for (idx, item) in items.into_iter().enumerate() {
            let fut = work(self.clone(), item);
            tasks.spawn(async move { (idx, fut.await) });
        }
        let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, out)) => slots[idx] = Some(out),
                Err(e) => tracing::error!(error = %e, "device task failed"),
            }
        }
        slots
    }

    // ── Validation ────────────────────────────────────────────

    /// Validate every payload. A dry run only asks the device to validate
    /// its candidate (gNMI and RESTCONF payloads get a syntax check); a
    /// real run edits the candidate first and discards it again if the
    /// device rejects it.
    pub async fn validate_configuration(
        &self,
        payloads: &[CandidatePayload],
        dry_run: bool,
    ) -> Vec<ValidationResult> {
        let slots = self
            .fan_out(payloads.to_vec(), move |engine, payload| async move {
                engine.validate_one(&payload, dry_run).await
            })
            .await;
        payloads
            .iter()
            .zip(slots)
            .map(|(p, slot)| {
                slot.unwrap_or_else(|| {
                    ValidationResult::new(false, format!("Validation for {}", p.target), "Validation task aborted")
                        .for_target(&p.target)
                })
            })
            .collect()
    }

    async fn validate_one(&self, payload: &CandidatePayload, dry_run: bool) -> ValidationResult {
        let timestamp = Utc::now();
        let started = Instant::now();
        let mut steps = Steps::new(self.config.operation_timeout());
        let device = self.device_for(&payload.target, payload.vendor);

        let (test_name, outcome) = match payload.transport {
            Transport::Netconf => (
                "NETCONF",
                self.validate_netconf(&device, payload, dry_run, &mut steps).await,
            ),
            Transport::Gnmi => (
                "gNMI",
                self.validate_gnmi(&device, payload, dry_run, &mut steps).await,
            ),
            Transport::Restconf => ("RESTCONF", validate_restconf(payload, &mut steps).await),
        };

        let (success, details) = match outcome {
            Ok(details) => (true, details),
            Err(details) => {
                tracing::warn!(target_device = %payload.target, %details, "validation failed");
                (false, details)
            }
        };
        ValidationResult {
            success,
            target: Some(payload.target.clone()),
            test_name: format!("{test_name} validation for {}", payload.target),
            details,
            timestamp,
            duration_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            steps: steps.outcomes,
        }
    }

    async fn validate_netconf(
        &self,
        device: &Device,
        payload: &CandidatePayload,
        dry_run: bool,
        steps: &mut Steps,
    ) -> Result<String, String> {
        let session = self
            .connect_netconf(device)
            .await
            .map_err(|e| format!("Connection or validation error: {e}"))?;
        let mut lifecycle = Lifecycle::new(&payload.target);

        let outcome = tokio::select! {
            r = netconf_validation(session.as_ref(), &mut lifecycle, steps, payload, dry_run) => r,
            _ = self.cancel.cancelled() => Err(CommitError::Cancelled),
        };
        let failed_at = lifecycle.state();
        if outcome.is_err() {
            discard_uncommitted(session.as_ref(), &mut lifecycle, steps).await;
        }
        close_netconf(session.as_ref(), &device.device_id).await;

        match outcome {
            Ok(()) if dry_run => Ok("Candidate configuration validated successfully".into()),
            Ok(()) => Ok("Configuration applied and validated".into()),
            Err(e) if dry_run => Err(format!("Validation failed: {e}")),
            Err(e) if failed_at == LifecycleState::Idle => {
                Err(format!("Failed to apply configuration: {e}"))
            }
            Err(e) => Err(format!("Applied but validation failed: {e}")),
        }
    }

    async fn validate_gnmi(
        &self,
        device: &Device,
        payload: &CandidatePayload,
        dry_run: bool,
        steps: &mut Steps,
    ) -> Result<String, String> {
        let request = steps
            .run(ConfigOperation::SyntaxCheck, async {
                SetRequest::parse(&payload.payload)
            })
            .await
            .map_err(|e| format!("gNMI validation error: {e}"))?;
        if dry_run {
            return Ok("gNMI payload syntax validation passed".into());
        }
        self.apply_gnmi(device, &request, steps)
            .await
            .map(|()| "Configuration applied via gNMI".to_string())
            .map_err(|e| format!("gNMI validation error: {e}"))
    }

    // ── Commit ────────────────────────────────────────────────

    /// Commit every payload: edit, validate, then commit (confirmed when
    /// asked, with a `timeout_minutes` window). Successful confirmed
    /// commits are registered until confirmed, rolled back or expired.
    pub async fn commit_configurations(
        &self,
        payloads: &[CandidatePayload],
        confirmed: bool,
        timeout_minutes: u64,
    ) -> Vec<CommitResult> {
        let window = match (confirmed, confirm_window(timeout_minutes)) {
            (false, _) => None,
            (true, Some(window)) => Some(window),
            (true, None) => {
                tracing::warn!(timeout_minutes, "confirm timeout out of range, nothing committed");
                let message = format!(
                    "Invalid confirm timeout: {timeout_minutes} minutes (allowed 1..={MAX_CONFIRM_TIMEOUT_MINUTES})"
                );
                return payloads
                    .iter()
                    .map(|p| CommitResult::failed(&p.target, message.clone()))
                    .collect();
            }
        };
        let slots = self
            .fan_out(payloads.to_vec(), move |engine, payload| async move {
                engine.commit_one(&payload, window).await
            })
            .await;
        payloads
            .iter()
            .zip(slots)
            .map(|(p, slot)| slot.unwrap_or_else(|| CommitResult::failed(&p.target, "Commit task aborted")))
            .collect()
    }

    async fn commit_one(
        &self,
        payload: &CandidatePayload,
        window: Option<ConfirmWindow>,
    ) -> CommitResult {
        let device = self.device_for(&payload.target, payload.vendor);
        let confirmed = window.is_some();
        let result = match payload.transport {
            Transport::Netconf => self.commit_netconf(&device, payload, window).await,
            Transport::Gnmi => self.commit_gnmi(&device, payload).await,
            Transport::Restconf => CommitResult::failed(
                &payload.target,
                format!("Unsupported transport for commit: {}", payload.transport),
            ),
        };
        if result.success {
            tracing::info!(target_device = %payload.target, commit_id = ?result.commit_id, confirmed, "commit succeeded");
        } else {
            tracing::warn!(target_device = %payload.target, error = ?result.error_message, "commit failed");
        }
        result
    }

    async fn commit_netconf(
        &self,
        device: &Device,
        payload: &CandidatePayload,
        window: Option<ConfirmWindow>,
    ) -> CommitResult {
        let target = &payload.target;
        let session = match self.connect_netconf(device).await {
            Ok(session) => session,
            Err(e) => return CommitResult::failed(target, format!("NETCONF commit error: {e}")),
        };
        let mut steps = Steps::new(self.config.operation_timeout());
        let mut lifecycle = Lifecycle::new(target);
        let outcome = tokio::select! {
            r = netconf_commit(
                session.as_ref(),
                &mut lifecycle,
                &mut steps,
                payload,
                window.map(|w| w.secs),
            ) => r,
            _ = self.cancel.cancelled() => Err(CommitError::Cancelled),
        };
        let failed_at = lifecycle.state();
        let discarded = match outcome {
            Ok(()) => false,
            Err(_) => discard_uncommitted(session.as_ref(), &mut lifecycle, &mut steps).await,
        };
        close_netconf(session.as_ref(), target).await;

        match outcome {
            Ok(()) => {
                let commit_id = uuid::Uuid::now_v7().to_string();
                let result = CommitResult::succeeded(target, &commit_id);
                let Some(window) = window else {
                    return result;
                };
                let entry =
                    self.registry
                        .register(target, &commit_id, window.delta, payload.clone());
                result.with_rollback_info(json!({
                    "method": "confirmed-commit-timeout",
                    "expires_at": entry.expires_at,
                }))
            }
            Err(e) => {
                let message = match (&e, failed_at) {
                    (CommitError::Cancelled, _) => "Commit cancelled".to_string(),
                    (_, LifecycleState::Idle) => {
                        format!("Failed to edit candidate configuration: {e}")
                    }
                    (_, LifecycleState::Edited) => format!("Configuration validation failed: {e}"),
                    _ => format!("Commit operation failed: {e}"),
                };
                CommitResult::failed(target, message)
                    .with_rollback_info(json!({ "discarded": discarded }))
            }
        }
    }

    async fn commit_gnmi(&self, device: &Device, payload: &CandidatePayload) -> CommitResult {
        let mut steps = Steps::new(self.config.operation_timeout());
        let applied = match SetRequest::parse(&payload.payload) {
            Ok(request) => self.apply_gnmi(device, &request, &mut steps).await,
            Err(e) => Err(CommitError::Payload(e.to_string())),
        };
        match applied {
            Ok(()) => CommitResult::succeeded(&payload.target, GNMI_IMMEDIATE),
            Err(e) => CommitResult::failed(&payload.target, format!("gNMI commit error: {e}")),
        }
    }

    async fn apply_gnmi(
        &self,
        device: &Device,
        request: &SetRequest,
        steps: &mut Steps,
    ) -> EngineResult<()> {
        let session = self.connect_gnmi(device).await?;
        let updates = request.updates();
        let deletes = request.deletes();
        let outcome = tokio::select! {
            r = steps.run(ConfigOperation::GnmiSet, session.set(&updates, &deletes)) => r.map_err(CommitError::from),
            _ = self.cancel.cancelled() => Err(CommitError::Cancelled),
        };
        if let Err(e) = session.close().await {
            tracing::debug!(device_id = %device.device_id, error = %e, "gnmi close failed");
        }
        outcome
    }

    // ── Confirm / rollback / expiry ───────────────────────────

    /// Confirm pending commits for `targets`, or for every registered
    /// target when `None`. Expired entries are swept first.
    pub async fn confirm_commits(&self, targets: Option<&[String]>) -> Vec<CommitResult> {
        self.cleanup_expired_commits();
        let targets = targets
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.registry.targets());
        let slots = self
            .fan_out(targets.clone(), |engine, target| async move {
                engine.confirm_one(&target).await
            })
            .await;
        targets
            .iter()
            .zip(slots)
            .map(|(t, slot)| slot.unwrap_or_else(|| CommitResult::failed(t, "Confirm task aborted")))
            .collect()
    }

    async fn confirm_one(&self, target: &str) -> CommitResult {
        let Some(entry) = self.registry.get(target) else {
            return CommitResult::failed(target, "No pending confirmed commit");
        };
        let device = self.device_for(target, entry.payload.vendor);
        let mut lifecycle = Lifecycle::pending(target);
        let mut steps = Steps::new(self.config.operation_timeout());

        let outcome: EngineResult<()> = async {
            let session = self.connect_netconf(&device).await?;
            let committed = steps
                .run(ConfigOperation::Commit, session.commit(false, None))
                .await;
            close_netconf(session.as_ref(), target).await;
            committed?;
            lifecycle.advance(LifecycleState::Committed)
        }
        .await;

        match outcome {
            Ok(()) => {
                if self.registry.remove_if(target, &entry.commit_id).is_none() {
                    tracing::debug!(target_device = %target, "registry entry replaced during confirm");
                }
                tracing::info!(target_device = %target, commit_id = %entry.commit_id, "commit confirmed");
                CommitResult::succeeded(target, entry.commit_id)
            }
            Err(e) => {
                tracing::warn!(target_device = %target, error = %e, "commit confirmation failed");
                CommitResult::failed(target, format!("Failed to confirm commit: {e}"))
            }
        }
    }

    /// Discard changes on `targets`, or on every registered target when
    /// `None`. The registry entry is dropped whether or not the device
    /// could be reached.
    pub async fn rollback_configurations(&self, targets: Option<&[String]>) -> Vec<CommitResult> {
        let targets = targets
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.registry.targets());
        let slots = self
            .fan_out(targets.clone(), |engine, target| async move {
                engine.rollback_one(&target).await
            })
            .await;
        targets
            .iter()
            .zip(slots)
            .map(|(t, slot)| slot.unwrap_or_else(|| CommitResult::failed(t, "Rollback task aborted")))
            .collect()
    }

    async fn rollback_one(&self, target: &str) -> CommitResult {
        let entry = self.registry.remove(target);
        let vendor = entry.as_ref().map(|e| e.payload.vendor).unwrap_or_default();
        let device = self.device_for(target, vendor);
        let mut steps = Steps::new(self.config.operation_timeout());

        let outcome: EngineResult<()> = async {
            let session = self.connect_netconf(&device).await?;
            let discarded = steps
                .run(ConfigOperation::DiscardChanges, session.discard_changes())
                .await;
            close_netconf(session.as_ref(), target).await;
            discarded?;
            if entry.is_some() {
                Lifecycle::pending(target).advance(LifecycleState::Idle)?;
            }
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tracing::info!(target_device = %target, "rolled back");
                CommitResult::succeeded(target, ROLLBACK_ID)
            }
            Err(e) => {
                tracing::warn!(target_device = %target, error = %e, "rollback failed");
                let mut result = CommitResult::failed(target, format!("Rollback error: {e}"));
                result.commit_id = Some(ROLLBACK_ID.into());
                result
            }
        }
    }

    /// Drop expired confirmed commits. No device is contacted: the device
    /// has already reverted on its own confirmed-commit timer.
    pub fn cleanup_expired_commits(&self) -> Vec<String> {
        self.registry
            .take_expired()
            .into_iter()
            .map(|(target, commit)| {
                tracing::warn!(
                    target_device = %target,
                    commit_id = %commit.commit_id,
                    expires_at = %commit.expires_at,
                    "confirmed commit expired without confirmation"
                );
                target
            })
            .collect()
    }

    pub fn get_active_commits(&self) -> BTreeMap<String, ActiveCommit> {
        self.registry.snapshot()
    }

    /// Periodically sweep expired commits until the engine is cancelled.
    pub fn spawn_expiry_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = engine.cleanup_expired_commits();
                        if !expired.is_empty() {
                            tracing::debug!(count = expired.len(), "expiry sweep removed commits");
                        }
                    }
                    _ = engine.cancel.cancelled() => break,
                }
            }
        })
    }

    // ── Sessions ──────────────────────────────────────────────

    async fn connect_netconf(&self, device: &Device) -> TransportResult<Box<dyn NetconfSession>> {
        with_timeout(
            "netconf connect",
            self.config.operation_timeout(),
            self.connector.netconf(device),
        )
        .await
    }

    async fn connect_gnmi(&self, device: &Device) -> TransportResult<Box<dyn GnmiSession>> {
        with_timeout(
            "gnmi connect",
            self.config.operation_timeout(),
            self.connector.gnmi(device),
        )
        .await
    }
}

/// Largest confirmed-commit window. NETCONF carries `confirm-timeout` as
/// uint32 seconds.
pub const MAX_CONFIRM_TIMEOUT_MINUTES: u64 = u32::MAX as u64 / 60;

/// Confirmed-commit window in device seconds and as a registry deadline.
#[derive(Debug, Clone, Copy)]
struct ConfirmWindow {
    secs: u64,
    delta: TimeDelta,
}

/// `None` when `timeout_minutes` is zero or does not fit a NETCONF timeout.
fn confirm_window(timeout_minutes: u64) -> Option<ConfirmWindow> {
    if timeout_minutes == 0 || timeout_minutes > MAX_CONFIRM_TIMEOUT_MINUTES {
        return None;
    }
    let secs = timeout_minutes.checked_mul(60)?;
    let delta = TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
    Some(ConfirmWindow { secs, delta })
}

async fn netconf_validation(
    session: &dyn NetconfSession,
    lifecycle: &mut Lifecycle,
    steps: &mut Steps,
    payload: &CandidatePayload,
    dry_run: bool,
) -> EngineResult<()> {
    if !dry_run {
        steps
            .run(
                ConfigOperation::EditConfig,
                session.edit_config(&payload.payload, Datastore::Candidate, DefaultOperation::Merge),
            )
            .await?;
        lifecycle.advance(LifecycleState::Edited)?;
    }
    steps
        .run(ConfigOperation::Validate, session.validate(Datastore::Candidate))
        .await?;
    if !dry_run {
        lifecycle.advance(LifecycleState::Validated)?;
    }
    Ok(())
}

/// `confirm_timeout_secs` is `Some` for a confirmed commit.
async fn netconf_commit(
    session: &dyn NetconfSession,
    lifecycle: &mut Lifecycle,
    steps: &mut Steps,
    payload: &CandidatePayload,
    confirm_timeout_secs: Option<u64>,
) -> EngineResult<()> {
    steps
        .run(
            ConfigOperation::EditConfig,
            session.edit_config(&payload.payload, Datastore::Candidate, DefaultOperation::Merge),
        )
        .await?;
    lifecycle.advance(LifecycleState::Edited)?;

    steps
        .run(ConfigOperation::Validate, session.validate(Datastore::Candidate))
        .await?;
    lifecycle.advance(LifecycleState::Validated)?;

    lifecycle.require(LifecycleState::Validated)?;
    let confirmed = confirm_timeout_secs.is_some();
    steps
        .run(
            ConfigOperation::Commit,
            session.commit(confirmed, confirm_timeout_secs),
        )
        .await?;
    lifecycle.advance(if confirmed {
        LifecycleState::CommitPending
    } else {
        LifecycleState::Committed
    })
}

/// Discard candidate changes left by a failed or cancelled lifecycle.
/// Returns whether a discard was issued successfully.
async fn discard_uncommitted(
    session: &dyn NetconfSession,
    lifecycle: &mut Lifecycle,
    steps: &mut Steps,
) -> bool {
    if !lifecycle.has_uncommitted_changes() {
        return false;
    }
    match steps
        .run(ConfigOperation::DiscardChanges, session.discard_changes())
        .await
    {
        Ok(()) => lifecycle.advance(LifecycleState::Idle).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "discard-changes failed, candidate left dirty");
            false
        }
    }
}

async fn close_netconf(session: &dyn NetconfSession, target: &str) {
    if let Err(e) = session.close().await {
        tracing::debug!(target_device = %target, error = %e, "netconf close failed");
    }
}

async fn validate_restconf(payload: &CandidatePayload, steps: &mut Steps) -> Result<String, String> {
    steps
        .run(ConfigOperation::SyntaxCheck, async {
            serde_json::from_str::<serde_json::Value>(&payload.payload)
                .map(|_| ())
                .map_err(|e| TransportError::Protocol(format!("invalid RESTCONF JSON: {e}")))
        })
        .await
        .map(|()| "RESTCONF payload syntax validation passed".to_string())
        .map_err(|e| format!("RESTCONF validation error: {e}"))
}
