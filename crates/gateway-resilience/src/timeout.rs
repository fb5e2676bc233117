//! Client-side deadlines.

use gateway_core::GatewayError;
use std::future::Future;
use std::time::Duration;

/// Race a future against a deadline.
///
/// On expiry the future is dropped and a `Timeout` error is returned. Work
/// already handed to a provider is not cancelled on its side.
///
/// # Errors
/// Returns `Timeout` when the deadline fires, otherwise the future's own error
pub async fn with_deadline<F, T>(timeout: Duration, future: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| GatewayError::timeout(timeout))?
}
