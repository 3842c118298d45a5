/// Polling helpers
///
/// Re-issue a fetch on a fixed interval until the result is terminal.
/// Fetch errors end the loop (no retry); cancelling the token ends it with
/// [`ClientError::Canceled`], including while a fetch is in flight.

use crate::backend::Backend;
use crate::error::{ClientError, Result};
use regen_shared::models::seed_job::SeedJob;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default interval between seed job polls
pub const SEED_JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Calls `fetch` every `interval` until `done` accepts the result
///
/// The first fetch happens immediately.
pub async fn poll_until<T, F, Fut, D>(
    interval: Duration,
    cancel: &CancellationToken,
    mut fetch: F,
    mut done: D,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    D: FnMut(&T) -> bool,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Canceled),
            _ = ticker.tick() => {}
        }

        let value = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Canceled),
            result = fetch() => result?,
        };

        if done(&value) {
            return Ok(value);
        }
    }
}

/// Polls a seed job until it succeeds, fails or is canceled
pub async fn poll_seed_job<B: Backend + ?Sized>(
    backend: &B,
    job_id: Uuid,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<SeedJob> {
    let job = poll_until(
        interval,
        cancel,
        || backend.seed_job(job_id),
        |job: &SeedJob| job.status.is_terminal(),
    )
    .await?;

    tracing::debug!(job_id = %job_id, status = job.status.as_str(), "Seed job finished");
    Ok(job)
}
