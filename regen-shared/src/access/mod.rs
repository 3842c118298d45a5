/// Access rules shared by the server and the client
///
/// Two independent axes decide what a user may reach:
///
/// - [`roles`]: the global role (`visitor < member < enterprise_owner < admin`),
///   governing which screens and CRM capabilities are reachable
/// - [`plan`]: the subscription tier (`free < crm_pro < crm_team`), governing
///   how much of the metered features may be consumed
///
/// [`guard`] combines both into the static route permission table.
///
/// Everything in this module is pure: predicates operate on in-memory records
/// and never touch the database.
///
/// # Example
///
/// ```
/// use regen_shared::access::{SessionUser, roles::{has_role, has_role_or_higher, UserRole}};
/// use uuid::Uuid;
///
/// let admin = SessionUser::new(Uuid::new_v4(), "ops@example.org", UserRole::Admin);
///
/// assert!(has_role(Some(&admin), &[UserRole::EnterpriseOwner, UserRole::Admin]));
/// assert!(has_role_or_higher(Some(&admin), UserRole::Member));
/// assert!(!has_role_or_higher(None, UserRole::Member));
/// ```

pub mod guard;
pub mod plan;
pub mod roles;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roles::UserRole;

/// The cached session user read by guards and predicates
///
/// This is the in-memory identity record the client keeps after a session
/// fetch, and the shape returned by `GET /v1/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User ID
    pub id: Uuid,

    /// Email address
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Global role
    pub role: UserRole,
}

impl SessionUser {
    /// Creates a session user without a display name
    pub fn new(id: Uuid, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id,
            email: email.into(),
            name: None,
            role,
        }
    }
}
