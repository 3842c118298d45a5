/// User model and database operations
///
/// Every account holds exactly one global [`UserRole`]. New accounts start
/// at `visitor`. The role only moves through three paths:
///
/// - an admin sets it explicitly ([`User::set_role`])
/// - a successful billing webhook promotes `visitor` to `member`
/// - claiming an enterprise promotes to `enterprise_owner`
///
/// The last two go through [`User::promote_to`], which never lowers a role.
///
/// Users are never hard-deleted; [`UserStatus`] soft-deletes them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL UNIQUE,
///     name TEXT,
///     password_hash TEXT NOT NULL,
///     role user_role NOT NULL DEFAULT 'visitor',
///     status user_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use regen_shared::models::user::{User, CreateUser};
/// use regen_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "grower@example.org".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Ada Grower".to_string()),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "Grower@Example.org").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::access::roles::UserRole;
use crate::access::SessionUser;

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
    Deactivated,
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, stored lowercase
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Global role
    pub role: UserRole,

    /// Lifecycle status
    pub status: UserStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (lowercased on insert)
    pub email: String,

    /// Argon2id password hash, never plaintext
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, role, status, created_at, updated_at, last_login_at";

impl User {
    /// Creates a new user with the lowest role
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique violation) or the
    /// database is unreachable
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, role)
             VALUES (LOWER($1), $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.email.trim())
            .bind(data.password_hash)
            .bind(data.name)
            .bind(UserRole::lowest())
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)");

        sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Sets the role unconditionally (admin action)
    ///
    /// Returns `None` if the user doesn't exist.
    pub async fn set_role<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(executor)
            .await
    }

    /// Raises the role to `role` if it is currently lower
    ///
    /// Postgres compares enum values in declaration order, which matches the
    /// role hierarchy. Returns `true` if the role changed.
    pub async fn promote_to<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        role: UserRole,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 AND role < $2",
        )
        .bind(id)
        .bind(role)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the lifecycle status (soft delete / suspension)
    pub async fn set_status(pool: &PgPool, id: Uuid, status: UserStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the account may sign in
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// The session view of this user
    pub fn to_session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole, status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            email: "grower@example.org".to_string(),
            name: Some("Ada Grower".to_string()),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$salt$hash".to_string(),
            role,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let json = serde_json::to_value(user(UserRole::Member, UserStatus::Active)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "member");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_to_session_user() {
        let u = user(UserRole::EnterpriseOwner, UserStatus::Active);
        let session = u.to_session_user();
        assert_eq!(session.id, u.id);
        assert_eq!(session.role, UserRole::EnterpriseOwner);
        assert_eq!(session.name.as_deref(), Some("Ada Grower"));
    }

    #[test]
    fn test_only_active_users_may_sign_in() {
        assert!(user(UserRole::Visitor, UserStatus::Active).is_active());
        assert!(!user(UserRole::Admin, UserStatus::Suspended).is_active());
        assert!(!user(UserRole::Member, UserStatus::Deactivated).is_active());
    }
}
