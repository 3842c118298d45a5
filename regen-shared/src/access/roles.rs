/// Global role vocabulary and role predicates
///
/// Roles form a strict total order fixed by [`ROLE_HIERARCHY`]:
///
/// ```text
/// visitor < member < enterprise_owner < admin
/// ```
///
/// - **visitor**: signed in, browses the public directory
/// - **member**: may use the CRM once a workspace is active
/// - **enterprise_owner**: has claimed at least one enterprise
/// - **admin**: platform operator, reaches `/admin`
///
/// The older `free / crm_pro / admin` vocabulary is not accepted here: `free`
/// and `crm_pro` are plan tiers (see [`super::plan::PlanTier`]) and were
/// migrated out of the role column.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SessionUser;

/// Global user roles, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Directory visitor (default for new accounts)
    Visitor,

    /// CRM member
    Member,

    /// Owner of at least one claimed enterprise
    EnterpriseOwner,

    /// Platform administrator
    Admin,
}

/// The fixed role hierarchy, lowest privilege first
pub const ROLE_HIERARCHY: [UserRole; 4] = [
    UserRole::Visitor,
    UserRole::Member,
    UserRole::EnterpriseOwner,
    UserRole::Admin,
];

/// Error returned when parsing an unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl UserRole {
    /// The role assigned to accounts on first sign-in
    pub const fn lowest() -> Self {
        UserRole::Visitor
    }

    /// Converts role to its wire/database name
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Visitor => "visitor",
            UserRole::Member => "member",
            UserRole::EnterpriseOwner => "enterprise_owner",
            UserRole::Admin => "admin",
        }
    }

    /// Position of this role in [`ROLE_HIERARCHY`]
    pub fn index(&self) -> usize {
        match self {
            UserRole::Visitor => 0,
            UserRole::Member => 1,
            UserRole::EnterpriseOwner => 2,
            UserRole::Admin => 3,
        }
    }

    /// Checks if this role meets or exceeds `required`
    pub fn at_least(&self, required: UserRole) -> bool {
        self.index() >= required.index()
    }

    /// Landing path a guard redirects to when this role is denied a route
    ///
    /// Every home path is reachable by the role it belongs to.
    pub fn home_path(&self) -> &'static str {
        match self {
            UserRole::Visitor => "/",
            UserRole::Member => "/directory",
            UserRole::EnterpriseOwner => "/crm",
            UserRole::Admin => "/admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(UserRole::Visitor),
            "member" => Ok(UserRole::Member),
            "enterprise_owner" => Ok(UserRole::EnterpriseOwner),
            "admin" => Ok(UserRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Role an optional session user is evaluated as in hierarchical checks
///
/// An absent user counts as the lowest role.
pub fn effective_role(user: Option<&SessionUser>) -> UserRole {
    user.map(|u| u.role).unwrap_or(UserRole::lowest())
}

/// Does the user hold one of `roles`?
///
/// An absent user passes only when the lowest role is part of the set.
pub fn has_role(user: Option<&SessionUser>, roles: &[UserRole]) -> bool {
    match user {
        Some(user) => roles.contains(&user.role),
        None => roles.contains(&UserRole::lowest()),
    }
}

/// Does the user meet or exceed `minimum` in the role hierarchy?
pub fn has_role_or_higher(user: Option<&SessionUser>, minimum: UserRole) -> bool {
    effective_role(user).at_least(minimum)
}

/// Role requirement attached to a guarded route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Anyone, signed in or not
    Any,

    /// Exact membership in a role set
    OneOf(&'static [UserRole]),

    /// Minimum role in the hierarchy
    AtLeast(UserRole),
}

impl RoleRequirement {
    /// Translates a role set written in the pre-split `free / crm_pro / admin`
    /// vocabulary
    ///
    /// Each name maps the way the legacy role migration rewrites accounts
    /// (`free` and `crm_pro` become `member`), and the requirement is the
    /// lowest of the mapped roles. Returns `None` for an empty set or an
    /// unknown name.
    pub fn from_legacy(names: &[&str]) -> Option<RoleRequirement> {
        names
            .iter()
            .map(|name| match *name {
                "free" | "crm_pro" => Some(UserRole::Member),
                other => other.parse::<UserRole>().ok(),
            })
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .min_by_key(|role| role.index())
            .map(RoleRequirement::AtLeast)
    }

    /// Evaluates the requirement against an optional session user
    pub fn is_satisfied_by(&self, user: Option<&SessionUser>) -> bool {
        match self {
            RoleRequirement::Any => true,
            RoleRequirement::OneOf(roles) => has_role(user, roles),
            RoleRequirement::AtLeast(minimum) => has_role_or_higher(user, *minimum),
        }
    }
}
