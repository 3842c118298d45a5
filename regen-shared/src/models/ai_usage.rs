/// AI copilot token metering
///
/// Each copilot call appends one row. Consumption for a billing period is
/// the sum over rows created since the period started; nothing is
/// pre-aggregated.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE ai_usage_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     enterprise_id UUID REFERENCES enterprises(id) ON DELETE SET NULL,
///     tokens_used BIGINT NOT NULL CHECK (tokens_used >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// One metered copilot call
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiUsageLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub enterprise_id: Option<Uuid>,
    pub tokens_used: i64,
    pub created_at: DateTime<Utc>,
}

impl AiUsageLog {
    /// Appends a usage row
    pub async fn record(
        pool: &PgPool,
        user_id: Uuid,
        enterprise_id: Option<Uuid>,
        tokens_used: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiUsageLog>(
            r#"
            INSERT INTO ai_usage_logs (user_id, enterprise_id, tokens_used)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, enterprise_id, tokens_used, created_at
            "#,
        )
        .bind(user_id)
        .bind(enterprise_id)
        .bind(tokens_used.max(0))
        .fetch_one(pool)
        .await
    }

    /// Tokens consumed by `user_id` since `since`
    pub async fn tokens_used_since(
        pool: &PgPool,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(tokens_used), 0)::BIGINT
            FROM ai_usage_logs
            WHERE user_id = $1 AND created_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }
}
