//! Bounded polling

use perftest_config::PollSettings;
use std::future::Future;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// Probe every `settings.interval` until `probe` returns `true`.
///
/// Fails with [`PluginError::Timeout`] once `settings.timeout` has passed
/// without success. Probe errors end the wait immediately. Returns the
/// number of probes made.
pub async fn poll_until<F, Fut>(what: &str, settings: &PollSettings, mut probe: F) -> PluginResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PluginResult<bool>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe().await? {
            debug!(what, attempts, "Condition reached");
            return Ok(attempts);
        }

        let elapsed = started.elapsed();
        if elapsed + settings.interval > settings.timeout {
            return Err(PluginError::Timeout {
                what: what.to_string(),
                elapsed,
            });
        }
        debug!(what, attempts, "Condition not reached yet");
        sleep(settings.interval).await;
    }
}
