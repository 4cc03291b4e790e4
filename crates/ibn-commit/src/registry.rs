//! Confirmed commits awaiting confirmation.
//!
//! Each entry mirrors the device-side confirmed-commit timer: once
//! `expires_at` passes the device has already rolled back on its own, so
//! the entry is simply dropped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use ibn_protocol::CandidatePayload;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCommit {
    pub commit_id: String,
    pub registered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub payload: CandidatePayload,
}

/// Target → pending confirmed commit. Owned by one engine; cheap to share.
pub struct CommitRegistry {
    clock: Arc<dyn Clock>,
    entries: Mutex<BTreeMap<String, ActiveCommit>>,
}

impl CommitRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ActiveCommit>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a confirmed commit that must be confirmed within `timeout`.
    pub fn register(
        &self,
        target: &str,
        commit_id: &str,
        timeout: Duration,
        payload: CandidatePayload,
    ) -> ActiveCommit {
        let now = self.now();
        let entry = ActiveCommit {
            commit_id: commit_id.to_string(),
            registered_at: now,
            expires_at: now.checked_add_signed(timeout).unwrap_or(DateTime::<Utc>::MAX_UTC),
            payload,
        };
        self.lock().insert(target.to_string(), entry.clone());
        entry
    }

    pub fn get(&self, target: &str) -> Option<ActiveCommit> {
        self.lock().get(target).cloned()
    }

    pub fn remove(&self, target: &str) -> Option<ActiveCommit> {
        self.lock().remove(target)
    }

    /// Remove the entry for `target` only if it still holds `commit_id`.
    pub fn remove_if(&self, target: &str, commit_id: &str) -> Option<ActiveCommit> {
        let mut entries = self.lock();
        match entries.get(target) {
            Some(entry) if entry.commit_id == commit_id => entries.remove(target),
            _ => None,
        }
    }

    pub fn targets(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, ActiveCommit> {
        self.lock().clone()
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn take_expired(&self) -> Vec<(String, ActiveCommit)> {
        let now = self.now();
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, c)| c.expires_at <= now)
            .map(|(t, _)| t.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|t| entries.remove(&t).map(|c| (t, c)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommitRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
