/// Public directory and the enterprise claim flow
///
/// - `GET /v1/enterprises?category&verified&q&limit&offset` (public)
/// - `GET /v1/enterprises/:id` (public)
/// - `POST /v1/enterprises/:id/claim` (signed in)
///
/// Claiming is how a user activates a CRM workspace: the enterprise gets an
/// owner, the user gets an `owner` team membership, and the user's global
/// role is raised to `enterprise_owner` (never lowered, so admins stay
/// admins). All three writes commit together.

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
    access::roles::UserRole,
    models::{
        enterprise::{DirectoryQuery, Enterprise},
        enterprise_member::{CreateEnterpriseMember, EnterpriseMember, TeamRole},
        onboarding_progress,
        user::User,
    },
    onboarding::OnboardingFlow,
    workspace::dashboard_path,
};
use serde::Serialize;
use uuid::Uuid;

/// A page of directory results
#[derive(Debug, Serialize)]
pub struct DirectoryPage {
    pub items: Vec<Enterprise>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Searches the public directory
pub async fn list_enterprises(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Json<DirectoryPage>> {
    let items = Enterprise::search(&state.db, &query).await?;
    let total = Enterprise::count(&state.db, &query).await?;

    Ok(Json(DirectoryPage {
        items,
        total,
        limit: query.effective_limit(),
        offset: query.effective_offset(),
    }))
}

/// One directory listing
pub async fn get_enterprise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Enterprise>> {
    let enterprise = Enterprise::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Enterprise not found".to_string()))?;

    Ok(Json(enterprise))
}

/// Result of a successful claim
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub enterprise: Enterprise,

    /// Where the client should navigate next
    pub redirect_to: String,
}

/// Claims an unclaimed enterprise for the caller
///
/// # Errors
///
/// - `404 Not Found`: no such enterprise
/// - `409 Conflict`: already claimed
pub async fn claim_enterprise(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClaimResponse>> {
    let mut tx = state.db.begin().await?;

    let Some(enterprise) = Enterprise::claim(&mut *tx, id, user.id()).await? else {
        return match Enterprise::find_by_id(&mut *tx, id).await? {
            Some(_) => Err(ApiError::Conflict("Enterprise already claimed".to_string())),
            None => Err(ApiError::NotFound("Enterprise not found".to_string())),
        };
    };

    // An invited teammate may already hold a lower team role
    let upgraded = EnterpriseMember::update_role(&mut *tx, id, user.id(), TeamRole::Owner).await?;
    if upgraded.is_none() {
        EnterpriseMember::create(
            &mut *tx,
            CreateEnterpriseMember {
                enterprise_id: id,
                user_id: user.id(),
                role: TeamRole::Owner,
            },
        )
        .await?;
    }

    let promoted = User::promote_to(&mut *tx, user.id(), UserRole::EnterpriseOwner).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id(),
        enterprise_id = %id,
        promoted,
        "Enterprise claimed"
    );

    if let Err(e) =
        onboarding_progress::complete_step(&state.db, user.id(), OnboardingFlow::Crm, "claim_enterprise").await
    {
        tracing::warn!(user_id = %user.id(), "Failed to record claim onboarding step: {}", e);
    }

    Ok(Json(ClaimResponse {
        redirect_to: dashboard_path(enterprise.id),
        enterprise,
    }))
}
