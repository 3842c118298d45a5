/// Subscription model and database operations
///
/// Subscriptions are written only by the billing webhook. A user may have
/// many historical rows but at most one *live* row (status `trialing` or
/// `active`). The database does not enforce that; [`Subscription::apply_update`]
/// does, by canceling every other live row of the user in the same
/// transaction that activates a new one.
///
/// A row that is already `canceled` only becomes live again when the update
/// starts a newer billing period. Anything else is a late delivery of an
/// older event and is ignored.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscriptions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     plan plan_tier NOT NULL,
///     status subscription_status NOT NULL,
///     billing_period billing_period NOT NULL DEFAULT 'monthly',
///     provider_customer_id TEXT,
///     provider_subscription_id TEXT UNIQUE,
///     current_period_start TIMESTAMPTZ,
///     current_period_end TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use regen_shared::models::subscription::{Subscription, SubscriptionUpdate};
/// use regen_shared::access::plan::{BillingPeriod, PlanTier, SubscriptionState};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// Subscription::apply_update(&mut tx, SubscriptionUpdate {
///     user_id,
///     plan: PlanTier::CrmPro,
///     status: SubscriptionState::Active,
///     billing_period: BillingPeriod::Monthly,
///     provider_customer_id: Some("cus_123".to_string()),
///     provider_subscription_id: "sub_123".to_string(),
///     current_period_start: None,
///     current_period_end: None,
/// }).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use tracing::info;
use uuid::Uuid;

use crate::access::plan::{BillingPeriod, PlanTier, SubscriptionState, SubscriptionStatus};

/// Subscription row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionState,
    pub billing_period: BillingPeriod,

    /// Billing provider customer id
    pub provider_customer_id: Option<String>,

    /// Billing provider subscription id (unique)
    pub provider_subscription_id: Option<String>,

    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// State reported by the billing provider for one subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionState,
    pub billing_period: BillingPeriod,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, status, billing_period, provider_customer_id, \
                                    provider_subscription_id, current_period_start, current_period_end, \
                                    created_at, updated_at";

impl Subscription {
    /// The user's live subscription, if any
    pub async fn find_live<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE user_id = $1 AND status IN ('trialing', 'active')
             ORDER BY updated_at DESC
             LIMIT 1"
        );

        sqlx::query_as::<_, Subscription>(&sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Whether `update` would bring this canceled row back to life without
    /// starting a newer billing period
    pub fn is_stale_revival(&self, update: &SubscriptionUpdate) -> bool {
        if self.status != SubscriptionState::Canceled || !update.status.is_live() {
            return false;
        }

        match (update.current_period_start, self.current_period_start) {
            (Some(incoming), Some(stored)) => incoming <= stored,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Applies a provider update, keeping at most one live row per user
    ///
    /// Must run inside a transaction: the upsert and the cancellation of the
    /// user's other live rows have to commit together. A stale revival of a
    /// canceled row returns the stored row unchanged.
    pub async fn apply_update(
        conn: &mut PgConnection,
        data: SubscriptionUpdate,
    ) -> Result<Self, sqlx::Error> {
        // Serialize concurrent webhooks for the same user
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(data.user_id)
            .execute(&mut *conn)
            .await?;

        let existing_sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE provider_subscription_id = $1
             FOR UPDATE"
        );
        let existing = sqlx::query_as::<_, Subscription>(&existing_sql)
            .bind(&data.provider_subscription_id)
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(existing) = existing {
            if existing.is_stale_revival(&data) {
                info!(
                    subscription_id = %existing.id,
                    incoming = data.status.as_str(),
                    "Ignored late update for canceled subscription"
                );
                return Ok(existing);
            }
        }

        let sql = format!(
            "INSERT INTO subscriptions (
                 user_id, plan, status, billing_period, provider_customer_id,
                 provider_subscription_id, current_period_start, current_period_end
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (provider_subscription_id) DO UPDATE SET
                 plan = EXCLUDED.plan,
                 status = EXCLUDED.status,
                 billing_period = EXCLUDED.billing_period,
                 provider_customer_id = COALESCE(EXCLUDED.provider_customer_id, subscriptions.provider_customer_id),
                 current_period_start = EXCLUDED.current_period_start,
                 current_period_end = EXCLUDED.current_period_end,
                 updated_at = NOW()
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );

        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(data.user_id)
            .bind(data.plan)
            .bind(data.status)
            .bind(data.billing_period)
            .bind(data.provider_customer_id)
            .bind(&data.provider_subscription_id)
            .bind(data.current_period_start)
            .bind(data.current_period_end)
            .fetch_one(&mut *conn)
            .await?;

        if subscription.status.is_live() {
            let canceled = sqlx::query(
                "UPDATE subscriptions SET status = 'canceled', updated_at = NOW()
                 WHERE user_id = $1 AND id <> $2 AND status IN ('trialing', 'active')",
            )
            .bind(subscription.user_id)
            .bind(subscription.id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            if canceled > 0 {
                info!(
                    user_id = %subscription.user_id,
                    canceled,
                    "Canceled superseded live subscriptions"
                );
            }
        }

        Ok(subscription)
    }

    /// Client-facing status of this row
    pub fn to_status(&self, tokens_used: i64) -> SubscriptionStatus {
        let mut status = SubscriptionStatus {
            plan: self.plan,
            status: self.status,
            billing_period: self.billing_period,
            current_period_end: self.current_period_end,
            token_quota: 0,
            tokens_used,
        };
        status.token_quota = status.effective_tier().token_quota();
        status
    }
}

/// Status for a user with or without a live subscription
pub fn status_for(live: Option<&Subscription>, tokens_used: i64) -> SubscriptionStatus {
    match live {
        Some(subscription) => subscription.to_status(tokens_used),
        None => SubscriptionStatus::free(tokens_used),
    }
}
