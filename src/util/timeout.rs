//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::auth::BridgeError;

/// Wrap a bridge call with a timeout; elapsed calls become transport errors.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, BridgeError>>,
) -> Result<T, BridgeError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::transport(format!(
            "Backend did not respond within {}ms",
            duration.as_millis()
        ))),
    }
}
