//! Flood-control retry.

use std::future::Future;

use linkdrop_core::ChatError;

/// Run `op`; if the platform answers with `RetryAfter`, wait it out and try
/// exactly once more. A second `RetryAfter` is returned as is.
pub async fn with_flood_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    match op().await {
        Err(ChatError::RetryAfter(delay)) => {
            tracing::warn!(operation = what, ?delay, "Flood control hit, waiting before retry");
            tokio::time::sleep(delay).await;
            op().await
        }
        other => other,
    }
}
