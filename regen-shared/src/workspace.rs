/// Workspace (enterprise tenant) resolution
///
/// A CRM session is scoped to exactly one enterprise at a time, the
/// "workspace". The client remembers the last selection under
/// [`WORKSPACE_STORAGE_KEY`]; on load the remembered id is reused only if the
/// user still belongs to that enterprise, otherwise the first membership
/// becomes current.
///
/// A user without memberships has no workspace at all. That is a normal
/// state, not an error: the caller is sent to the claim/activation flow at
/// [`ACTIVATION_PATH`] whatever their global role.
///
/// # Example
///
/// ```
/// use regen_shared::workspace::{resolve_workspace, WorkspaceResolution};
///
/// assert_eq!(resolve_workspace(None, &[]), WorkspaceResolution::NeedsActivation);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enterprise_member::TeamRole;

/// Local store key holding the current workspace id
pub const WORKSPACE_STORAGE_KEY: &str = "regen.workspace.current";

/// Where users without any workspace are sent
pub const ACTIVATION_PATH: &str = "/onboarding/claim";

/// One enterprise the user can open as a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkspaceMembership {
    /// Enterprise ID
    pub enterprise_id: Uuid,

    /// Enterprise display name
    pub enterprise_name: String,

    /// The user's role in this enterprise
    pub team_role: TeamRole,

    /// When the user joined
    pub joined_at: DateTime<Utc>,
}

/// Outcome of workspace resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkspaceResolution {
    /// A workspace is selected
    Active {
        membership: WorkspaceMembership,
        /// True when the cached selection was still valid
        reused_cached: bool,
    },

    /// No memberships; show the activation flow
    NeedsActivation,
}

impl WorkspaceResolution {
    /// The selected enterprise id, if any
    pub fn enterprise_id(&self) -> Option<Uuid> {
        match self {
            WorkspaceResolution::Active { membership, .. } => Some(membership.enterprise_id),
            WorkspaceResolution::NeedsActivation => None,
        }
    }

    /// Where the UI should land for this resolution
    pub fn landing_path(&self) -> String {
        match self {
            WorkspaceResolution::Active { membership, .. } => {
                dashboard_path(membership.enterprise_id)
            }
            WorkspaceResolution::NeedsActivation => ACTIVATION_PATH.to_string(),
        }
    }
}

/// Resolves the current workspace from a cached id and the membership list
///
/// `memberships` must be in join order; the first one is the default.
pub fn resolve_workspace(
    cached: Option<Uuid>,
    memberships: &[WorkspaceMembership],
) -> WorkspaceResolution {
    if let Some(cached) = cached {
        if let Some(found) = memberships.iter().find(|m| m.enterprise_id == cached) {
            return WorkspaceResolution::Active {
                membership: found.clone(),
                reused_cached: true,
            };
        }
    }

    match memberships.first() {
        Some(first) => WorkspaceResolution::Active {
            membership: first.clone(),
            reused_cached: false,
        },
        None => WorkspaceResolution::NeedsActivation,
    }
}

/// Dashboard route of a workspace
pub fn dashboard_path(enterprise_id: Uuid) -> String {
    format!("/crm/{}/dashboard", enterprise_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(name: &str) -> WorkspaceMembership {
        WorkspaceMembership {
            enterprise_id: Uuid::new_v4(),
            enterprise_name: name.to_string(),
            team_role: TeamRole::Owner,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_reuses_cached_membership() {
        let list = vec![membership("Seed Bank"), membership("Soil Coop")];
        let resolution = resolve_workspace(Some(list[1].enterprise_id), &list);

        assert_eq!(
            resolution,
            WorkspaceResolution::Active {
                membership: list[1].clone(),
                reused_cached: true,
            }
        );
    }

    #[test]
    fn test_stale_cache_falls_back_to_first() {
        let list = vec![membership("Seed Bank"), membership("Soil Coop")];
        let resolution = resolve_workspace(Some(Uuid::new_v4()), &list);

        assert_eq!(resolution.enterprise_id(), Some(list[0].enterprise_id));
        assert!(matches!(
            resolution,
            WorkspaceResolution::Active {
                reused_cached: false,
                ..
            }
        ));
    }

    #[test]
    fn test_no_memberships_needs_activation() {
        let resolution = resolve_workspace(Some(Uuid::new_v4()), &[]);
        assert_eq!(resolution, WorkspaceResolution::NeedsActivation);
        assert_eq!(resolution.landing_path(), ACTIVATION_PATH);
        assert_eq!(resolution.enterprise_id(), None);
    }

    #[test]
    fn test_landing_path_is_dashboard() {
        let list = vec![membership("Seed Bank")];
        let id = list[0].enterprise_id;
        assert_eq!(
            resolve_workspace(None, &list).landing_path(),
            format!("/crm/{}/dashboard", id)
        );
    }
}
