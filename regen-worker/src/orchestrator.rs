/// Seed worker orchestrator
///
/// The main worker loop: polls the seed queue, runs each claimed job on its
/// own Tokio task and records the outcome.
///
/// # Architecture
///
/// ```text
/// SeedOrchestrator
///   ├─> SeedQueue: claim pending jobs
///   ├─> seeder::run_job: insert listings (one task per job)
///   └─> SeedQueue: mark succeeded / failed
/// ```
///
/// # Shutdown
///
/// Cancelling the token returned by [`SeedOrchestrator::shutdown_token`]
/// stops polling and cancels every running job. Interrupted jobs roll back
/// and are marked failed. The loop waits up to the configured grace period
/// for them to settle.
///
/// # Example
///
/// ```no_run
/// use regen_worker::orchestrator::{OrchestratorConfig, SeedOrchestrator};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let orchestrator = SeedOrchestrator::new(pool, OrchestratorConfig::default());
/// let shutdown = orchestrator.shutdown_token();
///
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::queue::SeedQueue;
use crate::seeder::{self, SeedError};
use regen_shared::models::seed_job::SeedJob;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Seconds between polls when the queue is empty
    pub poll_interval_secs: u64,

    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,

    /// Seconds to wait for running jobs on shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 5,
            max_concurrent_jobs: 2,
            shutdown_grace_secs: 30,
        }
    }
}

impl OrchestratorConfig {
    /// Reads `SEED_POLL_INTERVAL_SECS`, `SEED_MAX_CONCURRENT_JOBS` and
    /// `SEED_SHUTDOWN_GRACE_SECS`, keeping defaults for unset values
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = OrchestratorConfig::default();

        let config = OrchestratorConfig {
            poll_interval_secs: env_or("SEED_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            max_concurrent_jobs: env_or("SEED_MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs)?,
            shutdown_grace_secs: env_or("SEED_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace_secs)?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("SEED_POLL_INTERVAL_SECS must be at least 1");
        }
        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("SEED_MAX_CONCURRENT_JOBS must be at least 1");
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

/// Seed worker orchestrator
pub struct SeedOrchestrator {
    queue: SeedQueue,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl SeedOrchestrator {
    pub fn new(db: PgPool, config: OrchestratorConfig) -> Self {
        SeedOrchestrator {
            queue: SeedQueue::with_batch_size(db, config.max_concurrent_jobs),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Seed orchestrator starting"
        );

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut active: HashMap<Uuid, JoinHandle<()>> = HashMap::new();

        loop {
            active.retain(|_, handle| !handle.is_finished());

            if self.shutdown_token.is_cancelled() {
                break;
            }

            let available_slots = self.config.max_concurrent_jobs.saturating_sub(active.len());
            let jobs = if available_slots == 0 {
                Vec::new()
            } else {
                match self.queue.claim_jobs(Some(available_slots)).await {
                    Ok(jobs) => jobs,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to claim seed jobs");
                        Vec::new()
                    }
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = self.shutdown_token.cancelled() => {}
                    _ = sleep(poll_interval) => {}
                }
                continue;
            }

            for job in jobs {
                let job_id = job.id;
                let handle = tokio::spawn(execute_job(
                    self.queue.clone(),
                    job,
                    self.shutdown_token.child_token(),
                ));
                active.insert(job_id, handle);
            }
        }

        self.drain(active).await;
        tracing::info!("Seed orchestrator shut down");
        Ok(())
    }

    /// Waits for running jobs, up to the grace period
    async fn drain(&self, mut active: HashMap<Uuid, JoinHandle<()>>) {
        if active.is_empty() {
            return;
        }

        tracing::info!(count = active.len(), "Waiting for running seed jobs");
        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_grace_secs);

        while !active.is_empty() && Instant::now() < deadline {
            sleep(Duration::from_millis(100)).await;
            active.retain(|_, handle| !handle.is_finished());
        }

        if !active.is_empty() {
            tracing::warn!(count = active.len(), "Shutting down with seed jobs still running");
            for handle in active.values() {
                handle.abort();
            }
        }
    }
}

/// Runs one claimed job and records the outcome
async fn execute_job(queue: SeedQueue, job: SeedJob, cancel: CancellationToken) {
    let job_id = job.id;

    tracing::info!(
        job_id = %job_id,
        requested_by = %job.requested_by,
        count = job.requested_count,
        category = job.category.map(|c| c.as_str()).unwrap_or("mixed"),
        "Running seed job"
    );

    let outcome = match seeder::run_job(queue.pool(), &job, &cancel).await {
        Ok(created) => queue.mark_succeeded(job_id, created).await,
        Err(SeedError::Interrupted) => {
            queue.mark_failed(job_id, "Interrupted by worker shutdown").await
        }
        Err(e) => queue.mark_failed(job_id, &e.to_string()).await,
    };

    if let Err(e) = outcome {
        tracing::error!(job_id = %job_id, error = %e, "Failed to record seed job outcome");
    }
}
