/// Admin console endpoints (global role `admin` only)
///
/// - `GET /v1/admin/tables/:table?limit&offset`: browse a whitelisted table
/// - `PUT /v1/admin/users/:id/role`: change a user's global role
/// - `POST /v1/admin/seed-jobs`: enqueue a bulk-seeding job
/// - `GET /v1/admin/seed-jobs/:id`: poll a job
/// - `POST /v1/admin/seed-jobs/:id/cancel`: cancel a job that hasn't started

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use regen_shared::{
    access::roles::{RoleRequirement, UserRole},
    auth::authorization::require_global_role,
    models::{
        admin_table::AdminTable,
        crm::Page,
        seed_job::{CreateSeedJob, SeedJob},
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const ADMIN_ONLY: RoleRequirement = RoleRequirement::OneOf(&[UserRole::Admin]);

fn require_admin(user: &CurrentUser) -> ApiResult<()> {
    require_global_role(Some(&user.session()), ADMIN_ONLY)?;
    Ok(())
}

/// One page of a table
#[derive(Debug, Serialize)]
pub struct TablePage {
    pub table: AdminTable,
    pub rows: Vec<serde_json::Value>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn browse_table(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(table): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Json<TablePage>> {
    require_admin(&user)?;

    let table = table
        .parse::<AdminTable>()
        .map_err(|e| ApiError::NotFound(e.to_string()))?;

    let rows = table.browse(&state.db, page).await?;
    let total = table.count(&state.db).await?;

    Ok(Json(TablePage {
        table,
        rows,
        total,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

/// Body of `PUT /v1/admin/users/:id/role`
#[derive(Debug, Deserialize)]
pub struct SetRole {
    pub role: UserRole,
}

/// Sets a user's global role
///
/// Admins can't demote themselves, so the console can't lock out its last
/// operator by accident.
pub async fn set_user_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target_id): Path<Uuid>,
    Json(body): Json<SetRole>,
) -> ApiResult<Json<User>> {
    require_admin(&user)?;

    if target_id == user.id() && body.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Admins cannot demote themselves".to_string()));
    }

    let updated = User::set_role(&state.db, target_id, body.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        user_id = %target_id,
        changed_by = %user.id(),
        role = body.role.as_str(),
        "Global role changed"
    );

    Ok(Json(updated))
}

pub async fn create_seed_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateSeedJob>,
) -> ApiResult<(StatusCode, Json<SeedJob>)> {
    require_admin(&user)?;
    body.validate()?;

    let job = SeedJob::create(&state.db, user.id(), body).await?;

    tracing::info!(
        job_id = %job.id,
        requested_by = %user.id(),
        count = job.requested_count,
        "Seed job enqueued"
    );

    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn get_seed_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SeedJob>> {
    require_admin(&user)?;

    let job = SeedJob::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Seed job not found".to_string()))?;

    Ok(Json(job))
}

/// Cancels a pending job; running jobs finish on their own
pub async fn cancel_seed_job(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SeedJob>> {
    require_admin(&user)?;

    let canceled = SeedJob::cancel_pending(&state.db, id).await?;
    let job = SeedJob::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Seed job not found".to_string()))?;

    if !canceled {
        return Err(ApiError::Conflict(format!(
            "Seed job is {} and can no longer be canceled",
            job.status.as_str()
        )));
    }

    tracing::info!(job_id = %id, canceled_by = %user.id(), "Seed job canceled");
    Ok(Json(job))
}
