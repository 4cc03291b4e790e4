//! Transport error types.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by device sessions.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0} transport is not available")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout {
                operation: "http request".into(),
                timeout_ms: 0,
            }
        } else if e.is_connect() {
            TransportError::Connection(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

/// Convenience alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;

/// Run a transport operation under a deadline.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            operation: operation.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_expires() {
        let result: TransportResult<()> = with_timeout("edit-config", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        match result {
            Err(TransportError::Timeout { operation, timeout_ms }) => {
                assert_eq!(operation, "edit-config");
                assert_eq!(timeout_ms, 5000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn with_timeout_passes_inner_error_through() {
        let result: TransportResult<()> = with_timeout("validate", Duration::from_secs(5), async {
            Err(TransportError::Rpc("invalid value".into()))
        })
        .await;
        assert!(matches!(result, Err(TransportError::Rpc(_))));
    }

    #[test]
    fn display_messages() {
        let e = TransportError::Unsupported("gNMI".into());
        assert_eq!(e.to_string(), "gNMI transport is not available");
    }
}
