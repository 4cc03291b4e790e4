//! Validation and commit engine.
//!
//! Drives each device through `edit → validate → commit` on its candidate
//! datastore, tracks confirmed commits awaiting confirmation in an
//! [`CommitRegistry`], and runs post-deployment verification.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod verification;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CommitConfig;
pub use engine::{CommitEngine, MAX_CONFIRM_TIMEOUT_MINUTES};
pub use error::{CommitError, EngineResult};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registry::{ActiveCommit, CommitRegistry};
pub use verification::{create_verification_plan, run_verification};
