/// Admin bulk-seeding jobs
///
/// An admin enqueues a job asking for N sample enterprises; `regen-worker`
/// claims it, inserts the listings and records the outcome. The client polls
/// `GET /v1/admin/seed-jobs/:id` until the status is terminal.
///
/// # State machine
///
/// ```text
/// pending ──claim──> running ──> succeeded
///    │                  └──────> failed
///    └──────────────────────────> canceled
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TABLE seed_jobs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     requested_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     category enterprise_category,
///     requested_count INTEGER NOT NULL CHECK (requested_count > 0 AND requested_count <= 1000),
///     created_count INTEGER NOT NULL DEFAULT 0,
///     status seed_job_status NOT NULL DEFAULT 'pending',
///     error TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     started_at TIMESTAMPTZ,
///     finished_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::enterprise::EnterpriseCategory;

/// Seed job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seed_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeedJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl SeedJobStatus {
    /// No further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SeedJobStatus::Succeeded | SeedJobStatus::Failed | SeedJobStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeedJobStatus::Pending => "pending",
            SeedJobStatus::Running => "running",
            SeedJobStatus::Succeeded => "succeeded",
            SeedJobStatus::Failed => "failed",
            SeedJobStatus::Canceled => "canceled",
        }
    }
}

/// A bulk-seeding job
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeedJob {
    pub id: Uuid,

    /// Admin who enqueued the job
    pub requested_by: Uuid,

    /// Category of generated listings; mixed when `None`
    pub category: Option<EnterpriseCategory>,

    pub requested_count: i32,

    /// Listings inserted so far
    pub created_count: i32,

    pub status: SeedJobStatus,

    /// Failure reason
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Body of `POST /v1/admin/seed-jobs`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSeedJob {
    pub category: Option<EnterpriseCategory>,

    #[validate(range(min = 1, max = 1000))]
    pub count: i32,
}

/// Columns selected for every seed job query
pub const SEED_JOB_COLUMNS: &str = "id, requested_by, category, requested_count, created_count, \
                                    status, error, created_at, started_at, finished_at";

impl SeedJob {
    /// Enqueues a pending job
    pub async fn create(
        pool: &PgPool,
        requested_by: Uuid,
        data: CreateSeedJob,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO seed_jobs (requested_by, category, requested_count)
             VALUES ($1, $2, $3)
             RETURNING {SEED_JOB_COLUMNS}"
        );

        sqlx::query_as::<_, SeedJob>(&sql)
            .bind(requested_by)
            .bind(data.category)
            .bind(data.count)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {SEED_JOB_COLUMNS} FROM seed_jobs WHERE id = $1");

        sqlx::query_as::<_, SeedJob>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Moves a running job to a terminal state
    ///
    /// Returns `false` if the job was not running (already finished or
    /// canceled by an admin).
    pub async fn finish<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: SeedJobStatus,
        created_count: i32,
        error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE seed_jobs
            SET status = $2, created_count = $3, error = $4, finished_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(created_count)
        .bind(error)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancels a job that hasn't been claimed yet
    pub async fn cancel_pending(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE seed_jobs SET status = 'canceled', finished_at = NOW()
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SeedJobStatus::Pending.is_terminal());
        assert!(!SeedJobStatus::Running.is_terminal());
        assert!(SeedJobStatus::Succeeded.is_terminal());
        assert!(SeedJobStatus::Failed.is_terminal());
        assert!(SeedJobStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_create_seed_job_validation() {
        assert!(CreateSeedJob { category: None, count: 25 }.validate().is_ok());
        assert!(CreateSeedJob { category: None, count: 0 }.validate().is_err());
        assert!(CreateSeedJob { category: None, count: 1001 }.validate().is_err());
    }
}
