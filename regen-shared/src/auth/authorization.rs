/// Authorization checks
///
/// Three independent axes are checked here, each with its own helper:
///
/// 1. **Global role**: [`require_global_role`] against a [`RoleRequirement`]
/// 2. **Plan tier**: [`require_plan`] against the user's subscription status
/// 3. **Team role**: [`require_team_role`], scoped to one enterprise and read
///    from the membership row
///
/// The axes never imply one another. In particular a global `admin` has no
/// implicit team role in an enterprise it isn't a member of: platform
/// operators reach tenant data only through the `/admin` routes.
///
/// # Example
///
/// ```no_run
/// use regen_shared::auth::authorization::require_team_role;
/// use regen_shared::models::enterprise_member::TeamRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, enterprise_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let role = require_team_role(&pool, enterprise_id, user_id, TeamRole::Editor).await?;
/// assert!(role.can_edit_records());
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::access::plan::{plan_gate, PlanGate, PlanTier, SubscriptionStatus};
use crate::access::roles::{effective_role, RoleRequirement, UserRole};
use crate::access::SessionUser;
use crate::models::enterprise_member::{EnterpriseMember, TeamRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the enterprise
    #[error("Not a member of enterprise {0}")]
    NotMember(Uuid),

    /// Team role below the required level
    #[error("Insufficient team role: requires {}, has {}", required.as_str(), actual.as_str())]
    InsufficientTeamRole { required: TeamRole, actual: TeamRole },

    /// Global role doesn't satisfy the requirement
    #[error("Insufficient role: {actual} may not access this resource")]
    InsufficientRole { actual: UserRole },

    /// Effective plan below the required tier
    #[error("Plan {required} required, current plan is {current}")]
    PlanRequired { current: PlanTier, required: PlanTier },

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks the caller's global role against `requirement`
///
/// # Errors
///
/// Returns `AuthzError::InsufficientRole` with the caller's effective role
pub fn require_global_role(
    user: Option<&SessionUser>,
    requirement: RoleRequirement,
) -> Result<(), AuthzError> {
    if requirement.is_satisfied_by(user) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            actual: effective_role(user),
        })
    }
}

/// Checks the effective plan against `required`
///
/// The status must already be loaded; server-side there is no loading state.
pub fn require_plan(status: &SubscriptionStatus, required: PlanTier) -> Result<(), AuthzError> {
    match plan_gate(Some(status), required) {
        PlanGate::Denied { current, required } => Err(AuthzError::PlanRequired { current, required }),
        PlanGate::Allowed | PlanGate::Loading => Ok(()),
    }
}

/// Checks that `role` meets `required`
pub fn check_team_role(role: TeamRole, required: TeamRole) -> Result<TeamRole, AuthzError> {
    if role.has_permission(&required) {
        Ok(role)
    } else {
        Err(AuthzError::InsufficientTeamRole {
            required,
            actual: role,
        })
    }
}

/// Loads the caller's team role in `enterprise_id` and checks it meets `required`
///
/// Returns the caller's actual team role on success.
///
/// # Errors
///
/// - `AuthzError::NotMember` if the user has no membership row
/// - `AuthzError::InsufficientTeamRole` if the role is too low
pub async fn require_team_role(
    pool: &PgPool,
    enterprise_id: Uuid,
    user_id: Uuid,
    required: TeamRole,
) -> Result<TeamRole, AuthzError> {
    let role = EnterpriseMember::get_role(pool, enterprise_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(enterprise_id))?;

    check_team_role(role, required)
}
