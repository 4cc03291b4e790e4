//! Pipeline error types.

use thiserror::Error;

/// Errors that abort a whole intent run. Per-device problems never end up
/// here; they are reported as discovery gaps or skipped payloads.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("duplicate device id in inventory: {0}")]
    DuplicateDevice(String),

    #[error("entity extraction failed: {0}")]
    Extraction(String),

    #[error("pipeline task aborted: {0}")]
    Aborted(String),
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
