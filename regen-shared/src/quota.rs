/// AI copilot token quota
///
/// Each plan tier includes a number of copilot tokens per billing period:
///
/// | plan       | tokens / period |
/// |------------|-----------------|
/// | `free`     | 10,000          |
/// | `crm_pro`  | 500,000         |
/// | `crm_team` | 2,000,000       |
///
/// The period starts at the live subscription's `current_period_start`, or
/// at the first of the current UTC month for users without one. Usage is
/// summed from `ai_usage_logs`.
///
/// # Example
///
/// ```no_run
/// use regen_shared::quota::QuotaEnforcer;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = QuotaEnforcer::new(pool);
///
/// // Refuses the call when 1,500 more tokens would exceed the plan
/// enforcer.enforce_tokens(user_id, 1_500).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::plan::SubscriptionStatus;
use crate::models::ai_usage::AiUsageLog;
use crate::models::subscription::{status_for, Subscription};

/// Quota enforcement error
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// The request would exceed the plan's tokens
    #[error("Token quota exceeded ({current}/{limit})")]
    LimitExceeded { current: i64, limit: i64 },

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaCheckResult {
    /// Whether the request fits in the remaining quota
    pub allowed: bool,

    /// Tokens already used this period
    pub current: i64,

    /// Tokens included in the plan
    pub limit: i64,

    /// Tokens left before the request
    pub remaining: i64,
}

impl QuotaCheckResult {
    pub fn allowed(current: i64, limit: i64) -> Self {
        QuotaCheckResult {
            allowed: true,
            current,
            limit,
            remaining: limit.saturating_sub(current).max(0),
        }
    }

    pub fn exceeded(current: i64, limit: i64) -> Self {
        QuotaCheckResult {
            allowed: false,
            current,
            limit,
            remaining: limit.saturating_sub(current).max(0),
        }
    }
}

/// Checks `requested` more tokens against a loaded status
pub fn check_against(status: &SubscriptionStatus, requested: i64) -> QuotaCheckResult {
    let current = status.tokens_used;
    let limit = status.token_quota;

    if current.saturating_add(requested.max(0)) > limit {
        QuotaCheckResult::exceeded(current, limit)
    } else {
        QuotaCheckResult::allowed(current, limit)
    }
}

/// Start of the billing period usage is counted from
pub fn period_start(live: Option<&Subscription>, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(start) = live.and_then(|s| s.current_period_start) {
        if start <= now {
            return start;
        }
    }

    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Quota service backed by the subscription and usage tables
#[derive(Clone)]
pub struct QuotaEnforcer {
    db: PgPool,
}

impl QuotaEnforcer {
    pub fn new(db: PgPool) -> Self {
        QuotaEnforcer { db }
    }

    /// The user's subscription status with current-period usage filled in
    ///
    /// This is what `GET /v1/subscription` returns.
    pub async fn subscription_status(&self, user_id: Uuid) -> Result<SubscriptionStatus, QuotaError> {
        let live = Subscription::find_live(&self.db, user_id).await?;
        let since = period_start(live.as_ref(), Utc::now());
        let used = AiUsageLog::tokens_used_since(&self.db, user_id, since).await?;

        Ok(status_for(live.as_ref(), used))
    }

    /// Checks whether `requested` more tokens fit in the current period
    pub async fn check_tokens(&self, user_id: Uuid, requested: i64) -> Result<QuotaCheckResult, QuotaError> {
        let status = self.subscription_status(user_id).await?;
        Ok(check_against(&status, requested))
    }

    /// Like [`check_tokens`](Self::check_tokens) but fails when exceeded
    pub async fn enforce_tokens(&self, user_id: Uuid, requested: i64) -> Result<QuotaCheckResult, QuotaError> {
        let result = self.check_tokens(user_id, requested).await?;

        if !result.allowed {
            return Err(QuotaError::LimitExceeded {
                current: result.current,
                limit: result.limit,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::plan::{BillingPeriod, PlanTier, SubscriptionState};

    #[test]
    fn test_check_against_free_plan() {
        let status = SubscriptionStatus::free(9_000);

        let ok = check_against(&status, 1_000);
        assert!(ok.allowed);
        assert_eq!(ok.remaining, 1_000);

        let over = check_against(&status, 1_001);
        assert!(!over.allowed);
        assert_eq!(over.limit, 10_000);
    }

    #[test]
    fn test_exceeded_remaining_never_negative() {
        let result = QuotaCheckResult::exceeded(12_000, 10_000);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_period_start_defaults_to_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 12, 30, 0).unwrap();
        assert_eq!(
            period_start(None, now),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_period_start_uses_subscription_period() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 12, 30, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 9, 8, 0, 0).unwrap();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: PlanTier::CrmPro,
            status: SubscriptionState::Active,
            billing_period: BillingPeriod::Monthly,
            provider_customer_id: None,
            provider_subscription_id: None,
            current_period_start: Some(start),
            current_period_end: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(period_start(Some(&subscription), now), start);
    }
}
