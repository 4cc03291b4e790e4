//! Per-device candidate datastore lifecycle.
//!
//! ```text
//! Idle ──edit──▶ Edited ──validate──▶ Validated ──commit──▶ Committed
//!                  │                     │  └──confirmed──▶ CommitPending ──confirm──▶ Committed
//!                  └──────discard────────┴──────────────────────┴──rollback/expiry──▶ Idle
//! ```

use serde::Serialize;

use crate::error::{CommitError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Idle,
    Edited,
    Validated,
    CommitPending,
    Committed,
}

impl LifecycleState {
    fn can_move_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Idle, Edited)
                | (Edited, Validated)
                | (Validated, Committed)
                | (Validated, CommitPending)
                | (CommitPending, Committed)
                | (Edited | Validated | CommitPending, Idle)
        )
    }
}

/// Lifecycle of one device during one engine call.
#[derive(Debug)]
pub struct Lifecycle {
    target: String,
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new(target: impl Into<String>) -> Self {
        Self::starting_at(target, LifecycleState::Idle)
    }

    /// Lifecycle of a device that already has a confirmed commit pending.
    pub fn pending(target: impl Into<String>) -> Self {
        Self::starting_at(target, LifecycleState::CommitPending)
    }

    fn starting_at(target: impl Into<String>, state: LifecycleState) -> Self {
        Self {
            target: target.into(),
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Fails unless the device is currently in `expected`.
    pub fn require(&self, expected: LifecycleState) -> EngineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CommitError::IllegalTransition {
                from: self.state,
                to: expected,
            })
        }
    }

    pub fn advance(&mut self, to: LifecycleState) -> EngineResult<()> {
        if !self.state.can_move_to(to) {
            return Err(CommitError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        tracing::trace!(device = %self.target, from = ?self.state, to = ?to, "lifecycle transition");
        self.state = to;
        Ok(())
    }

    /// True when the candidate datastore holds uncommitted changes.
    pub fn has_uncommitted_changes(&self) -> bool {
        matches!(self.state, LifecycleState::Edited | LifecycleState::Validated)
    }
}
