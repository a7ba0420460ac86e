//! Timeout helpers for provider calls

use std::time::Duration;

/// Default bound on a single provider attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply timeout to an async operation
///
/// Returns `Err` with the original error type if the operation times out.
pub async fn with_timeout<T, E>(
    timeout: Duration,
    future: impl std::future::Future<Output = Result<T, E>>,
) -> Result<T, TimeoutError<E>> {
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TimeoutError::Inner(err)),
        Err(_) => Err(TimeoutError::Timeout(timeout)),
    }
}

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutError::Timeout(_))
    }

    /// Collapse into the inner error type, mapping an elapsed timer with `on_timeout`
    pub fn flatten(self, on_timeout: impl FnOnce(Duration) -> E) -> E {
        match self {
            TimeoutError::Inner(e) => e,
            TimeoutError::Timeout(d) => on_timeout(d),
        }
    }
}
