/// Subscription status and copilot metering
///
/// - `GET /v1/subscription`: plan, status and the token quota for the
///   current billing period
/// - `POST /v1/copilot/usage`: records tokens spent by a copilot call
///
/// The plan is orthogonal to the global role: a `member` on `crm_pro` gets
/// the copilot, an `enterprise_owner` on `free` doesn't.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::CurrentUser,
};
use axum::{extract::State, Json};
use regen_shared::{
    access::plan::{PlanTier, SubscriptionStatus},
    auth::authorization::{require_plan, require_team_role},
    models::{ai_usage::AiUsageLog, enterprise_member::TeamRole},
    quota::{QuotaCheckResult, QuotaEnforcer},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Plan required for the copilot
pub const COPILOT_PLAN: PlanTier = PlanTier::CrmPro;

/// Response of `GET /v1/subscription`
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub status: SubscriptionStatus,

    /// Plan actually granted (`free` unless trialing or active)
    pub effective_plan: PlanTier,

    pub tokens_remaining: i64,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<SubscriptionResponse>> {
    let status = QuotaEnforcer::new(state.db.clone())
        .subscription_status(user.id())
        .await?;

    Ok(Json(SubscriptionResponse {
        effective_plan: status.effective_tier(),
        tokens_remaining: status.tokens_remaining(),
        status,
    }))
}

/// Body of `POST /v1/copilot/usage`
#[derive(Debug, Deserialize, Validate)]
pub struct RecordUsage {
    /// Workspace the call ran in, if any
    pub enterprise_id: Option<Uuid>,

    #[validate(range(min = 1, max = 1000000, message = "tokens must be between 1 and 1000000"))]
    pub tokens: i64,
}

/// Records copilot token usage
///
/// Refused with 403 below `crm_pro` and with 429 when the tokens would
/// exceed the period's quota. The check and the insert are not atomic, so
/// concurrent calls can overshoot the quota by at most one call each.
pub async fn record_copilot_usage(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<RecordUsage>,
) -> ApiResult<Json<QuotaCheckResult>> {
    body.validate()?;

    if let Some(enterprise_id) = body.enterprise_id {
        require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;
    }

    let enforcer = QuotaEnforcer::new(state.db.clone());
    let status = enforcer.subscription_status(user.id()).await?;
    require_plan(&status, COPILOT_PLAN)?;

    let before = enforcer.enforce_tokens(user.id(), body.tokens).await?;
    AiUsageLog::record(&state.db, user.id(), body.enterprise_id, body.tokens).await?;

    tracing::debug!(user_id = %user.id(), tokens = body.tokens, "Recorded copilot usage");

    let current = before.current + body.tokens;
    Ok(Json(QuotaCheckResult::allowed(current, before.limit)))
}
