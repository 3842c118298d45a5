/// Seed job queue
///
/// Claims pending seed jobs for execution and records their outcome.
///
/// # Claiming
///
/// Jobs are claimed oldest first with `FOR UPDATE SKIP LOCKED`, so several
/// workers can poll the same table without handing one job to two of them.
/// Claiming moves the job from `pending` to `running` and stamps
/// `started_at`. A job canceled by an admin before it was claimed is never
/// picked up.
///
/// # Example
///
/// ```no_run
/// use regen_worker::queue::SeedQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = SeedQueue::new(pool);
///
/// for job in queue.claim_jobs(Some(2)).await? {
///     println!("Claimed seed job {} ({} listings)", job.id, job.requested_count);
/// }
/// # Ok(())
/// # }
/// ```

use regen_shared::models::seed_job::{SeedJob, SeedJobStatus, SEED_JOB_COLUMNS};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Seed queue error
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job missing or no longer running
    #[error("Seed job not running: {0}")]
    JobNotRunning(Uuid),
}

/// Seed job queue
#[derive(Clone)]
pub struct SeedQueue {
    db: PgPool,

    /// Maximum jobs to claim in one batch
    batch_size: usize,
}

impl SeedQueue {
    pub fn new(db: PgPool) -> Self {
        SeedQueue { db, batch_size: 2 }
    }

    pub fn with_batch_size(db: PgPool, batch_size: usize) -> Self {
        SeedQueue { db, batch_size }
    }

    /// Database pool the queue runs on
    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Claims up to `limit` pending jobs (default: the batch size)
    pub async fn claim_jobs(&self, limit: Option<usize>) -> Result<Vec<SeedJob>, QueueError> {
        let limit = limit.unwrap_or(self.batch_size) as i64;

        let sql = format!(
            r#"
            WITH pending_jobs AS (
                SELECT id
                FROM seed_jobs
                WHERE status = $1
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE seed_jobs
            SET status = $3, started_at = NOW()
            FROM pending_jobs
            WHERE seed_jobs.id = pending_jobs.id
            RETURNING {}
            "#,
            qualified_columns()
        );

        let jobs = sqlx::query_as::<_, SeedJob>(&sql)
            .bind(SeedJobStatus::Pending)
            .bind(limit)
            .bind(SeedJobStatus::Running)
            .fetch_all(&self.db)
            .await?;

        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Claimed seed jobs");
        }

        Ok(jobs)
    }

    /// Marks a running job as succeeded
    pub async fn mark_succeeded(&self, job_id: Uuid, created_count: i32) -> Result<(), QueueError> {
        let finished =
            SeedJob::finish(&self.db, job_id, SeedJobStatus::Succeeded, created_count, None).await?;
        if !finished {
            return Err(QueueError::JobNotRunning(job_id));
        }

        tracing::info!(job_id = %job_id, created_count, "Seed job succeeded");
        Ok(())
    }

    /// Marks a running job as failed
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), QueueError> {
        let finished =
            SeedJob::finish(&self.db, job_id, SeedJobStatus::Failed, 0, Some(error)).await?;
        if !finished {
            return Err(QueueError::JobNotRunning(job_id));
        }

        tracing::warn!(job_id = %job_id, error, "Seed job failed");
        Ok(())
    }
}

/// `SEED_JOB_COLUMNS` qualified with the table name, for `UPDATE … FROM`
fn qualified_columns() -> String {
    SEED_JOB_COLUMNS
        .split(',')
        .map(|c| format!("seed_jobs.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_columns() {
        let columns = qualified_columns();
        assert!(columns.starts_with("seed_jobs.id, seed_jobs.requested_by"));
        assert!(columns.ends_with("seed_jobs.finished_at"));
        assert!(!columns.contains("seed_jobs. "));
    }
}
