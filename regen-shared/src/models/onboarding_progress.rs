/// Server copy of onboarding progress
///
/// The step map is stored as JSONB keyed by `(user_id, flow)`. Writes come
/// from two places:
///
/// - [`complete_step`]: the signed-in user finished a step
/// - [`sync`]: the client pushes a local copy; the newer `updated_at` wins
///
/// # Schema
///
/// ```sql
/// CREATE TABLE onboarding_progress (
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     flow TEXT NOT NULL,
///     steps JSONB NOT NULL DEFAULT '{}'::jsonb,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (user_id, flow)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::onboarding::{OnboardingError, OnboardingFlow, OnboardingProgress};

#[derive(Debug, sqlx::FromRow)]
struct ProgressRow {
    flow: String,
    steps: Json<BTreeMap<String, bool>>,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl ProgressRow {
    fn into_progress(self) -> Result<OnboardingProgress, sqlx::Error> {
        let flow = self
            .flow
            .parse::<OnboardingFlow>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(OnboardingProgress {
            flow,
            steps: self.steps.0,
            completed: self.completed,
            updated_at: self.updated_at,
        })
    }
}

/// Error type for onboarding persistence
#[derive(Debug, thiserror::Error)]
pub enum ProgressStoreError {
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of pushing a client copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// The copy now stored on the server
    pub stored: OnboardingProgress,

    /// Whether the pushed copy replaced the server copy
    pub accepted: bool,
}

/// Result of completing a step (`POST /v1/onboarding/:flow/steps/:step`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub progress: OnboardingProgress,

    /// False when the step had already been completed
    pub changed: bool,
}

async fn find_row<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    flow: OnboardingFlow,
    for_update: bool,
) -> Result<Option<OnboardingProgress>, sqlx::Error> {
    let sql = if for_update {
        "SELECT flow, steps, completed, updated_at FROM onboarding_progress
         WHERE user_id = $1 AND flow = $2 FOR UPDATE"
    } else {
        "SELECT flow, steps, completed, updated_at FROM onboarding_progress
         WHERE user_id = $1 AND flow = $2"
    };

    sqlx::query_as::<_, ProgressRow>(sql)
        .bind(user_id)
        .bind(flow.as_str())
        .fetch_optional(executor)
        .await?
        .map(ProgressRow::into_progress)
        .transpose()
}

async fn upsert(
    conn: &mut PgConnection,
    user_id: Uuid,
    progress: &OnboardingProgress,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO onboarding_progress (user_id, flow, steps, completed, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, flow) DO UPDATE SET
            steps = EXCLUDED.steps,
            completed = EXCLUDED.completed,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(user_id)
    .bind(progress.flow.as_str())
    .bind(Json(&progress.steps))
    .bind(progress.completed)
    .bind(progress.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Locks the user's row for `flow`, creating an empty one first if needed
///
/// The placeholder is dated at the epoch so any real copy is newer. Writers
/// racing on a user's first record queue on the row lock instead of
/// overwriting each other; if the transaction rolls back the placeholder
/// goes with it.
async fn lock_row(
    conn: &mut PgConnection,
    user_id: Uuid,
    flow: OnboardingFlow,
) -> Result<OnboardingProgress, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO onboarding_progress (user_id, flow, updated_at)
        VALUES ($1, $2, 'epoch')
        ON CONFLICT (user_id, flow) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(flow.as_str())
    .execute(&mut *conn)
    .await?;

    let progress = find_row(&mut *conn, user_id, flow, true)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    Ok(progress.normalized())
}

/// Loads the server copy, `None` if the user never started the flow
pub async fn find(
    pool: &PgPool,
    user_id: Uuid,
    flow: OnboardingFlow,
) -> Result<Option<OnboardingProgress>, sqlx::Error> {
    find_row(pool, user_id, flow, false).await
}

/// Marks a step done for a user
///
/// Returns the stored progress and whether anything was written. Completing
/// an already completed step performs no write.
pub async fn complete_step(
    pool: &PgPool,
    user_id: Uuid,
    flow: OnboardingFlow,
    step: &str,
) -> Result<StepResult, ProgressStoreError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut progress = lock_row(&mut tx, user_id, flow).await?;
    let changed = progress.complete_step(step, now)?;
    if changed {
        upsert(&mut tx, user_id, &progress).await?;
    }

    tx.commit().await?;
    Ok(StepResult { progress, changed })
}

/// Stores a client copy if it is newer than the server copy
pub async fn sync(
    pool: &PgPool,
    user_id: Uuid,
    incoming: OnboardingProgress,
) -> Result<SyncOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let current = lock_row(&mut tx, user_id, incoming.flow).await?;

    let outcome = if current.updated_at >= incoming.updated_at {
        SyncOutcome {
            stored: current,
            accepted: false,
        }
    } else {
        upsert(&mut tx, user_id, &incoming).await?;
        SyncOutcome {
            stored: incoming,
            accepted: true,
        }
    };

    tx.commit().await?;
    Ok(outcome)
}
