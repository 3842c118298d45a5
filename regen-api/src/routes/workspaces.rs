/// Workspace (tenant) endpoints
///
/// - `GET /v1/workspaces`: the caller's memberships, in join order
/// - `GET /v1/workspaces/current?cached=<id>`: resolves the active workspace
/// - `GET /v1/workspaces/:id/{dashboard,people,opportunities,tasks,members}`:
///   team role `viewer` or higher
/// - `PUT /v1/workspaces/:id/members/:user_id`: team role `admin` or higher;
///   only owners may grant or revoke `owner`, and the last owner can't be
///   demoted
///
/// Every CRM read is scoped by the enterprise id in the path and checked
/// against the caller's membership. A global `admin` without a membership
/// gets 403 here like anyone else.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::CurrentUser,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use regen_shared::{
    auth::authorization::{check_team_role, require_team_role},
    models::{
        crm::{CrmTask, DashboardSummary, Opportunity, Page, Person},
        enterprise_member::{EnterpriseMember, TeamRole},
    },
    workspace::{resolve_workspace, WorkspaceMembership, WorkspaceResolution},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller's workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<WorkspaceMembership>>> {
    let memberships = EnterpriseMember::list_workspaces(&state.db, user.id()).await?;
    Ok(Json(memberships))
}

/// Query for `GET /v1/workspaces/current`
#[derive(Debug, Deserialize)]
pub struct CurrentQuery {
    /// Workspace id remembered by the client
    pub cached: Option<Uuid>,
}

/// Resolved workspace plus the client's landing path
#[derive(Debug, Serialize)]
pub struct CurrentWorkspace {
    #[serde(flatten)]
    pub resolution: WorkspaceResolution,

    pub landing_path: String,
}

/// Resolves the active workspace
///
/// Users without any membership get `needs_activation` and the claim flow
/// path, whatever their global role.
pub async fn current_workspace(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CurrentQuery>,
) -> ApiResult<Json<CurrentWorkspace>> {
    let memberships = EnterpriseMember::list_workspaces(&state.db, user.id()).await?;
    let resolution = resolve_workspace(query.cached, &memberships);

    Ok(Json(CurrentWorkspace {
        landing_path: resolution.landing_path(),
        resolution,
    }))
}

/// Headline numbers for the workspace dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enterprise_id): Path<Uuid>,
) -> ApiResult<Json<DashboardSummary>> {
    require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;

    let summary = DashboardSummary::for_enterprise(&state.db, enterprise_id).await?;
    Ok(Json(summary))
}

pub async fn list_people(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enterprise_id): Path<Uuid>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Person>>> {
    require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;

    Ok(Json(Person::list_by_enterprise(&state.db, enterprise_id, page).await?))
}

pub async fn list_opportunities(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enterprise_id): Path<Uuid>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Opportunity>>> {
    require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;

    Ok(Json(Opportunity::list_by_enterprise(&state.db, enterprise_id, page).await?))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enterprise_id): Path<Uuid>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<CrmTask>>> {
    require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;

    Ok(Json(CrmTask::list_by_enterprise(&state.db, enterprise_id, page).await?))
}

pub async fn list_members(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enterprise_id): Path<Uuid>,
) -> ApiResult<Json<Vec<EnterpriseMember>>> {
    require_team_role(&state.db, enterprise_id, user.id(), TeamRole::Viewer).await?;

    Ok(Json(EnterpriseMember::list_by_enterprise(&state.db, enterprise_id).await?))
}

/// Body of `PUT /v1/workspaces/:id/members/:user_id`
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRole {
    pub role: TeamRole,
}

/// Checks whether `actor` may move a member from `current` to `requested`
///
/// Admins manage viewers, editors and other admins; anything touching the
/// `owner` role needs an owner.
pub fn can_change_team_role(actor: TeamRole, current: TeamRole, requested: TeamRole) -> bool {
    if !actor.can_manage_members() {
        return false;
    }

    let touches_owner = current == TeamRole::Owner || requested == TeamRole::Owner;
    !touches_owner || actor == TeamRole::Owner
}

/// Changes a teammate's role
///
/// # Errors
///
/// - `403 Forbidden`: caller below `admin`, or not an owner when `owner` is involved
/// - `404 Not Found`: target isn't a member
/// - `409 Conflict`: would leave the enterprise without an owner
pub async fn update_member_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((enterprise_id, member_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMemberRole>,
) -> ApiResult<Json<EnterpriseMember>> {
    let mut tx = state.db.begin().await?;

    let actor = EnterpriseMember::get_role(&mut *tx, enterprise_id, user.id())
        .await?
        .ok_or_else(|| ApiError::Forbidden("Not a member of this enterprise".to_string()))?;
    check_team_role(actor, TeamRole::Admin)?;

    let current = EnterpriseMember::get_role(&mut *tx, enterprise_id, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if !can_change_team_role(actor, current, body.role) {
        return Err(ApiError::Forbidden(
            "Only owners can grant or revoke the owner role".to_string(),
        ));
    }

    if current == TeamRole::Owner
        && body.role != TeamRole::Owner
        && EnterpriseMember::count_owners(&mut *tx, enterprise_id).await? <= 1
    {
        return Err(ApiError::Conflict(
            "Cannot demote the last owner of an enterprise".to_string(),
        ));
    }

    let member = EnterpriseMember::update_role(&mut *tx, enterprise_id, member_id, body.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    tx.commit().await?;

    tracing::info!(
        enterprise_id = %enterprise_id,
        user_id = %member_id,
        changed_by = %user.id(),
        from = current.as_str(),
        to = body.role.as_str(),
        "Team role changed"
    );

    Ok(Json(member))
}
