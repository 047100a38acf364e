use crate::error::{LifecycleError, Result};
use std::{future::Future, time::Duration};

/// Awaits remote call `fut`, failing with [`LifecycleError::Timeout`] if it
/// does not complete in `timeout`.
pub(crate) async fn with_deadline<T, E, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<LifecycleError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res.map_err(Into::into),
        Err(_) => {
            tracing::warn!(operation, ?timeout, "remote call timed out");
            Err(LifecycleError::Timeout { operation, timeout })
        }
    }
}
