//! External-Data Refreshers (C10): leader-only background jobs that pull
//! from outside systems and publish the result into [`crate::shared_state`]
//! for every worker (leader and followers alike) to read.

pub mod geofence;
pub mod pokestop_counts;

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, warn};

/// Shared retry helper: up to `attempts` tries of `op`, sleeping `delay`
/// between each, giving up (returning the last error) once exhausted.
/// Matches the original's per-area/per-request retry loops, which are
/// fixed-delay rather than exponential.
pub(crate) async fn with_bounded_retry<T, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "refresher call failed, retrying");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.expect("attempts >= 1"))
}

/// Runs `cycle` once at startup (after `jitter`), then every `interval`,
/// until `cancel` fires. Each refresher supplies its own `cycle` closure;
/// failures are logged and the loop continues rather than exiting.
pub fn spawn_refresh_loop<F, Fut>(
    name: &'static str,
    interval: Duration,
    jitter: Duration,
    cancel: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send,
{
    tokio::spawn(
        async move {
            tokio::time::sleep(jitter).await;
            loop {
                if let Err(e) = cycle().await {
                    warn!(refresher = name, error = %e, "refresh cycle failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => {
                        tracing::info!(refresher = name, "refresher stopping");
                        return;
                    }
                }
            }
        }
        .instrument(tracing::info_span!("refresher", name)),
    );
}
