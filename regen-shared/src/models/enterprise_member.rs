/// Enterprise team membership model and database operations
///
/// Team membership is the third access axis: a role scoped to one enterprise,
/// independent of the user's global role. A user can be `viewer` in one
/// workspace and `owner` in another.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('viewer', 'editor', 'admin', 'owner');
///
/// CREATE TABLE enterprise_members (
///     enterprise_id UUID NOT NULL REFERENCES enterprises(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'viewer',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (enterprise_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: Full control, billing, transfers ownership
/// - **admin**: Manages team members and CRM settings
/// - **editor**: Creates and edits contacts, opportunities, tasks
/// - **viewer**: Read-only access
///
/// # Example
///
/// ```no_run
/// use regen_shared::models::enterprise_member::{EnterpriseMember, CreateEnterpriseMember, TeamRole};
/// use regen_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let enterprise_id = Uuid::new_v4();
/// let user_id = Uuid::new_v4();
///
/// EnterpriseMember::create(&pool, CreateEnterpriseMember {
///     enterprise_id,
///     user_id,
///     role: TeamRole::Editor,
/// }).await?;
///
/// let role = EnterpriseMember::get_role(&pool, enterprise_id, user_id).await?;
/// assert_eq!(role, Some(TeamRole::Editor));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::workspace::WorkspaceMembership;

/// Roles scoped to a single enterprise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Read-only access to CRM data
    Viewer,

    /// Can create and edit CRM records
    Editor,

    /// Can manage team members
    Admin,

    /// Full control of the enterprise
    Owner,
}

impl TeamRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Viewer => "viewer",
            TeamRole::Editor => "editor",
            TeamRole::Admin => "admin",
            TeamRole::Owner => "owner",
        }
    }

    /// Can create and edit contacts, opportunities and tasks
    pub fn can_edit_records(&self) -> bool {
        !matches!(self, TeamRole::Viewer)
    }

    /// Can invite, remove and re-role team members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }

    /// Can manage the enterprise's billing
    pub fn can_manage_billing(&self) -> bool {
        matches!(self, TeamRole::Owner)
    }

    /// Checks if this role has the permission level of `required`
    ///
    /// Hierarchy: Owner > Admin > Editor > Viewer
    pub fn has_permission(&self, required: &TeamRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            TeamRole::Owner => 4,
            TeamRole::Admin => 3,
            TeamRole::Editor => 2,
            TeamRole::Viewer => 1,
        }
    }
}

/// A user's membership in an enterprise team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnterpriseMember {
    /// Enterprise ID
    pub enterprise_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the enterprise
    pub role: TeamRole,

    /// When the user joined the team
    pub joined_at: DateTime<Utc>,
}

/// Input for adding a user to an enterprise team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnterpriseMember {
    /// Enterprise ID
    pub enterprise_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role to assign (defaults to Viewer)
    #[serde(default = "default_role")]
    pub role: TeamRole,
}

fn default_role() -> TeamRole {
    TeamRole::Viewer
}

impl EnterpriseMember {
    /// Adds a user to an enterprise team
    ///
    /// Accepts any executor so the claim flow can run it inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The membership already exists (primary key violation)
    /// - Enterprise or user doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateEnterpriseMember,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, EnterpriseMember>(
            r#"
            INSERT INTO enterprise_members (enterprise_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING enterprise_id, user_id, role, joined_at
            "#,
        )
        .bind(data.enterprise_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await?;

        Ok(member)
    }

    /// Gets a user's team role in an enterprise, `None` if not a member
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use regen_shared::models::enterprise_member::EnterpriseMember;
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, enterprise_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// if let Some(role) = EnterpriseMember::get_role(&pool, enterprise_id, user_id).await? {
    ///     println!("Team role: {}", role.as_str());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_role<'e, E: PgExecutor<'e>>(
        executor: E,
        enterprise_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamRole>, sqlx::Error> {
        let role: Option<TeamRole> = sqlx::query_scalar(
            r#"
            SELECT role FROM enterprise_members
            WHERE enterprise_id = $1 AND user_id = $2
            "#,
        )
        .bind(enterprise_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(role)
    }

    /// Updates a member's team role
    ///
    /// Returns `None` if the membership doesn't exist.
    pub async fn update_role<'e, E: PgExecutor<'e>>(
        executor: E,
        enterprise_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, EnterpriseMember>(
            r#"
            UPDATE enterprise_members
            SET role = $3
            WHERE enterprise_id = $1 AND user_id = $2
            RETURNING enterprise_id, user_id, role, joined_at
            "#,
        )
        .bind(enterprise_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await?;

        Ok(member)
    }

    /// Lists all members of an enterprise, earliest first
    pub async fn list_by_enterprise(
        pool: &PgPool,
        enterprise_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, EnterpriseMember>(
            r#"
            SELECT enterprise_id, user_id, role, joined_at
            FROM enterprise_members
            WHERE enterprise_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(enterprise_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Lists the workspaces a user belongs to, in join order
    ///
    /// The first entry is the default workspace when nothing is cached.
    pub async fn list_workspaces(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceMembership>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, WorkspaceMembership>(
            r#"
            SELECT m.enterprise_id, e.name AS enterprise_name, m.role AS team_role, m.joined_at
            FROM enterprise_members m
            JOIN enterprises e ON e.id = m.enterprise_id
            WHERE m.user_id = $1
            ORDER BY m.joined_at ASC, m.enterprise_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Counts owners of an enterprise, locking their membership rows
    ///
    /// Used to refuse demoting the last owner. Run it inside the transaction
    /// that changes roles so two concurrent demotions can't both pass.
    pub async fn count_owners<'e, E: PgExecutor<'e>>(
        executor: E,
        enterprise_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let owners: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM enterprise_members
            WHERE enterprise_id = $1 AND role = 'owner'
            FOR UPDATE
            "#,
        )
        .bind(enterprise_id)
        .fetch_all(executor)
        .await?;

        Ok(owners.len() as i64)
    }
}
