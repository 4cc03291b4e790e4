//! Intent pipeline orchestration.
//!
//! Turns operator text plus an inventory into a reviewed change: normalized
//! intent, risk assessment, per-device model discovery, YANG path mapping,
//! rendered payloads, commit plan, verification plan and audit log. The
//! binary (`main.rs`) and the HTTP API both drive [`IntentProcessor`].

pub mod config;
pub mod error;
pub mod extractor;
pub mod normalizer;
pub mod processor;
pub mod risk;

pub use config::ControllerConfig;
pub use error::{PipelineError, PipelineResult};
pub use extractor::{EntityExtractor, RegexExtractor, extract_entities};
pub use normalizer::{detect_service_type, normalize};
pub use processor::{IntentProcessor, audit_log, commit_plan, payload_hash, summarize, verify_audit};
pub use risk::assess;
