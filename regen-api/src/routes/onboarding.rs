/// Onboarding progress
///
/// - `GET /v1/onboarding/:flow`: the server copy, or `null` if none yet
/// - `POST /v1/onboarding/:flow/steps/:step`: marks a step done (idempotent)
/// - `PUT /v1/onboarding/:flow`: pushes a client copy; the newer
///   `updated_at` wins and the response carries the copy now stored

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::CurrentUser,
};
use axum::{
    extract::{Path, State},
    Json,
};
use regen_shared::{
    models::onboarding_progress::{self, StepResult, SyncOutcome},
    onboarding::{OnboardingFlow, OnboardingProgress},
};

fn parse_flow(flow: &str) -> ApiResult<OnboardingFlow> {
    Ok(flow.parse::<OnboardingFlow>()?)
}

pub async fn get_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(flow): Path<String>,
) -> ApiResult<Json<Option<OnboardingProgress>>> {
    let flow = parse_flow(&flow)?;
    let progress = onboarding_progress::find(&state.db, user.id(), flow).await?;
    Ok(Json(progress))
}

pub async fn complete_step(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((flow, step)): Path<(String, String)>,
) -> ApiResult<Json<StepResult>> {
    let flow = parse_flow(&flow)?;
    let result = onboarding_progress::complete_step(&state.db, user.id(), flow, &step).await?;

    if result.changed {
        tracing::debug!(user_id = %user.id(), flow = %flow, step = %step, "Onboarding step completed");
    }

    Ok(Json(result))
}

/// Last-write-wins sync of a client copy
///
/// The pushed copy is normalized against the flow's step list first, so a
/// client can't store unknown steps or a `completed` flag that doesn't add up.
pub async fn sync_progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(flow): Path<String>,
    Json(incoming): Json<OnboardingProgress>,
) -> ApiResult<Json<SyncOutcome>> {
    let flow = parse_flow(&flow)?;
    if incoming.flow != flow {
        return Err(ApiError::BadRequest(format!(
            "Body is for the {} flow, path is for {}",
            incoming.flow, flow
        )));
    }

    let outcome = onboarding_progress::sync(&state.db, user.id(), incoming.normalized()).await?;
    Ok(Json(outcome))
}
