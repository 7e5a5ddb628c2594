use std::future::Future;

use tracing::warn;

use greenaudit_core::config::GatewaySettings;
use greenaudit_core::error::{AuditError, Result};

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
///
/// Rate limits and timeouts are retried after an exponentially growing delay.
/// Once `max_retries` retries have failed the last error is reported as
/// [`AuditError::GatewayUnavailable`].
pub async fn with_retry<T, F, Fut>(settings: &GatewaySettings, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < settings.max_retries => {
                let delay = settings.retry_delay(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "External call failed, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(AuditError::GatewayUnavailable(format!(
                    "{operation} failed after {} attempts: {e}",
                    attempt + 1
                )));
            }
            Err(e) => return Err(e),
        }
    }
}
