//! Backoff for blob store HTTP calls.
//!
//! Only transport errors (refused connections, timeouts) are retried. Any
//! HTTP response, 4xx and 5xx included, goes straight back to the caller.

use std::future::Future;
use std::time::Duration;

/// Attempt schedule: one initial try, then `retries` more with doubling
/// delays starting at `first_delay`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    pub retries: u32,
    pub first_delay: Duration,
}

impl Backoff {
    /// 200ms, 400ms, 800ms.
    pub const BLOB_STORE: Self = Self {
        retries: 3,
        first_delay: Duration::from_millis(200),
    };

    fn delay_before(&self, retry: u32) -> Duration {
        self.first_delay.saturating_mul(1 << retry.min(16))
    }

    /// Run `op` until it succeeds or the schedule is used up; the last error
    /// is returned. `op` must build a fresh request each call.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if retry >= self.retries => return Err(err),
                Err(err) => err,
            };
            let delay = self.delay_before(retry);
            retry += 1;
            tracing::warn!(%what, retry, of = self.retries, ?delay, error = %err, "blob store call failed");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Send one blob store request under [`Backoff::BLOB_STORE`].
pub(crate) async fn retry_send<F, Fut>(what: &str, f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    Backoff::BLOB_STORE.run(what, f).await
}
