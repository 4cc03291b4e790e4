use ibn_transport::TransportError;

use crate::lifecycle::LifecycleState;

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, CommitError>;
