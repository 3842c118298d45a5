/// Session and route guard endpoints
///
/// - `GET /v1/session`: the signed-in user, or `null`
/// - `GET /v1/guard?path=/crm/copilot`: the guard decision for the caller
///
/// Both accept anonymous callers. The guard endpoint runs the same
/// evaluation as the client guard, so the server can answer deep links and
/// server-rendered pages consistently.

use crate::{app::AppState, error::ApiResult, extract::MaybeUser};
use axum::{
    extract::{Query, State},
    Json,
};
use regen_shared::{
    access::{
        guard::{evaluate, rule_for, GuardState, SessionFetch},
        plan::SubscriptionStatus,
        SessionUser,
    },
    quota::QuotaEnforcer,
};
use serde::{Deserialize, Serialize};

/// Current session user, `null` when signed out
pub async fn get_session(user: MaybeUser) -> Json<Option<SessionUser>> {
    Json(user.session())
}

/// Query for `GET /v1/guard`
#[derive(Debug, Deserialize)]
pub struct GuardQuery {
    pub path: String,
}

/// Guard decision for one path
#[derive(Debug, Serialize)]
pub struct GuardDecision {
    /// The path evaluated
    pub path: String,

    /// Prefix of the permission table entry that matched
    pub rule: &'static str,

    #[serde(flatten)]
    pub state: GuardState,
}

/// Evaluates the route guard for the caller
///
/// The subscription is only loaded for plan-gated paths. The server never
/// answers `loading`: both fetches have completed by the time it evaluates.
pub async fn check_guard(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<GuardQuery>,
) -> ApiResult<Json<GuardDecision>> {
    let rule = rule_for(&query.path);
    let session = user.session();

    let subscription = match (&user.0, rule.plan) {
        (Some(u), Some(_)) => QuotaEnforcer::new(state.db.clone()).subscription_status(u.id).await?,
        _ => SubscriptionStatus::free(0),
    };

    let decision = evaluate(
        SessionFetch::Resolved(session.as_ref()),
        Some(&subscription),
        &query.path,
    );

    Ok(Json(GuardDecision {
        path: query.path,
        rule: rule.prefix,
        state: decision,
    }))
}
