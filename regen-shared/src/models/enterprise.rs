/// Enterprise model: directory listing and CRM tenant
///
/// Every enterprise is publicly listed in the directory. Once a user claims
/// it, it also becomes a CRM workspace: the claimer gets an `owner`
/// membership and `claimed_by` records who did it. An enterprise can be
/// claimed once.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE enterprises (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     description TEXT,
///     category enterprise_category NOT NULL DEFAULT 'other',
///     location TEXT,
///     website TEXT,
///     verified BOOLEAN NOT NULL DEFAULT FALSE,
///     claimed_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     claimed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

/// Closed set of directory categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enterprise_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnterpriseCategory {
    Agriculture,
    Forestry,
    Energy,
    Water,
    Materials,
    Food,
    Finance,
    Education,
    Other,
}

impl EnterpriseCategory {
    /// Every category, in display order
    pub const ALL: [EnterpriseCategory; 9] = [
        EnterpriseCategory::Agriculture,
        EnterpriseCategory::Forestry,
        EnterpriseCategory::Energy,
        EnterpriseCategory::Water,
        EnterpriseCategory::Materials,
        EnterpriseCategory::Food,
        EnterpriseCategory::Finance,
        EnterpriseCategory::Education,
        EnterpriseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnterpriseCategory::Agriculture => "agriculture",
            EnterpriseCategory::Forestry => "forestry",
            EnterpriseCategory::Energy => "energy",
            EnterpriseCategory::Water => "water",
            EnterpriseCategory::Materials => "materials",
            EnterpriseCategory::Food => "food",
            EnterpriseCategory::Finance => "finance",
            EnterpriseCategory::Education => "education",
            EnterpriseCategory::Other => "other",
        }
    }
}

/// Directory listing / CRM tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enterprise {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: EnterpriseCategory,
    pub location: Option<String>,
    pub website: Option<String>,

    /// Checked by platform operators
    pub verified: bool,

    /// User who claimed the listing, if any
    pub claimed_by: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enterprise {
    /// Whether the listing has been turned into a workspace
    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }
}

/// Input for creating a listing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateEnterprise {
    #[validate(length(min = 2, max = 200))]
    pub name: String,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    pub category: EnterpriseCategory,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    #[validate(url)]
    pub website: Option<String>,

    #[serde(default)]
    pub verified: bool,
}

/// Directory search filters (`GET /v1/enterprises`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryQuery {
    /// Only this category
    pub category: Option<EnterpriseCategory>,

    /// Only verified (or only unverified) listings
    pub verified: Option<bool>,

    /// Case-insensitive substring of name or description
    pub q: Option<String>,

    /// Page size (1-100, default 20)
    pub limit: Option<i64>,

    /// Rows to skip
    pub offset: Option<i64>,
}

impl DirectoryQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// `%term%` ILIKE pattern, with LIKE metacharacters escaped
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.q.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

const ENTERPRISE_COLUMNS: &str = "id, name, description, category, location, website, verified, \
                                  claimed_by, claimed_at, created_at, updated_at";

const DIRECTORY_FILTER: &str = "($1::enterprise_category IS NULL OR category = $1)
      AND ($2::boolean IS NULL OR verified = $2)
      AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3)";

impl Enterprise {
    /// Inserts a new listing
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateEnterprise,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO enterprises (name, description, category, location, website, verified)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ENTERPRISE_COLUMNS}"
        );

        sqlx::query_as::<_, Enterprise>(&sql)
            .bind(data.name)
            .bind(data.description)
            .bind(data.category)
            .bind(data.location)
            .bind(data.website)
            .bind(data.verified)
            .fetch_one(executor)
            .await
    }

    /// Finds a listing by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ENTERPRISE_COLUMNS} FROM enterprises WHERE id = $1");

        sqlx::query_as::<_, Enterprise>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Searches the public directory, verified listings first then by name
    pub async fn search(pool: &PgPool, query: &DirectoryQuery) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {ENTERPRISE_COLUMNS} FROM enterprises
             WHERE {DIRECTORY_FILTER}
             ORDER BY verified DESC, name ASC, id ASC
             LIMIT $4 OFFSET $5"
        );

        sqlx::query_as::<_, Enterprise>(&sql)
            .bind(query.category)
            .bind(query.verified)
            .bind(query.search_pattern())
            .bind(query.effective_limit())
            .bind(query.effective_offset())
            .fetch_all(pool)
            .await
    }

    /// Counts listings matching the filters (ignores paging)
    pub async fn count(pool: &PgPool, query: &DirectoryQuery) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM enterprises WHERE {DIRECTORY_FILTER}");

        sqlx::query_scalar(&sql)
            .bind(query.category)
            .bind(query.verified)
            .bind(query.search_pattern())
            .fetch_one(pool)
            .await
    }

    /// Marks an unclaimed listing as claimed by `user_id`
    ///
    /// Returns `None` if the listing doesn't exist or was already claimed.
    /// Runs as a single conditional update so two concurrent claims cannot
    /// both succeed.
    pub async fn claim<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE enterprises
             SET claimed_by = $2, claimed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND claimed_by IS NULL
             RETURNING {ENTERPRISE_COLUMNS}"
        );

        sqlx::query_as::<_, Enterprise>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_query_paging_is_clamped() {
        let query = DirectoryQuery::default();
        assert_eq!(query.effective_limit(), 20);
        assert_eq!(query.effective_offset(), 0);

        let query = DirectoryQuery {
            limit: Some(5000),
            offset: Some(-3),
            ..Default::default()
        };
        assert_eq!(query.effective_limit(), 100);
        assert_eq!(query.effective_offset(), 0);

        let query = DirectoryQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(query.effective_limit(), 1);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let query = DirectoryQuery {
            q: Some("  100%_soil ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_pattern().as_deref(), Some("%100\\%\\_soil%"));

        let blank = DirectoryQuery {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.search_pattern(), None);
    }

    #[test]
    fn test_category_serialization() {
        for category in EnterpriseCategory::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, category.as_str());
        }
    }

    #[test]
    fn test_create_enterprise_validation() {
        let valid = CreateEnterprise {
            name: "Riverbend Seed Bank".to_string(),
            description: None,
            category: EnterpriseCategory::Agriculture,
            location: Some("Oregon".to_string()),
            website: Some("https://riverbend.example.org".to_string()),
            verified: false,
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateEnterprise {
            name: "R".to_string(),
            website: Some("not a url".to_string()),
            ..valid
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("website"));
    }
}
