/// Read-only table browsing for the admin console
///
/// Only the tables listed in [`AdminTable`] can be browsed. Table and
/// column names come from this fixed list, never from the request, so they
/// can be spliced into SQL. Rows are returned as JSON objects with secrets
/// (`password_hash`) stripped.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;

use super::crm::Page;

/// Tables visible in the admin console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminTable {
    Users,
    Enterprises,
    EnterpriseMembers,
    People,
    Opportunities,
    Tasks,
    Subscriptions,
    AiUsageLogs,
    OnboardingProgress,
    SeedJobs,
}

/// Table name not on the whitelist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Table '{0}' is not available in the admin console")]
pub struct UnknownTable(pub String);

impl AdminTable {
    pub const ALL: [AdminTable; 10] = [
        AdminTable::Users,
        AdminTable::Enterprises,
        AdminTable::EnterpriseMembers,
        AdminTable::People,
        AdminTable::Opportunities,
        AdminTable::Tasks,
        AdminTable::Subscriptions,
        AdminTable::AiUsageLogs,
        AdminTable::OnboardingProgress,
        AdminTable::SeedJobs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminTable::Users => "users",
            AdminTable::Enterprises => "enterprises",
            AdminTable::EnterpriseMembers => "enterprise_members",
            AdminTable::People => "people",
            AdminTable::Opportunities => "opportunities",
            AdminTable::Tasks => "tasks",
            AdminTable::Subscriptions => "subscriptions",
            AdminTable::AiUsageLogs => "ai_usage_logs",
            AdminTable::OnboardingProgress => "onboarding_progress",
            AdminTable::SeedJobs => "seed_jobs",
        }
    }

    /// Newest-first ordering column
    fn order_column(&self) -> &'static str {
        match self {
            AdminTable::EnterpriseMembers => "joined_at",
            AdminTable::OnboardingProgress => "updated_at",
            _ => "created_at",
        }
    }

    /// One page of rows as JSON objects, newest first
    pub async fn browse(&self, pool: &PgPool, page: Page) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        let sql = format!(
            "SELECT to_jsonb(t) - 'password_hash' FROM {table} t
             ORDER BY t.{order} DESC
             LIMIT $1 OFFSET $2",
            table = self.as_str(),
            order = self.order_column(),
        );

        sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await
    }

    /// Total row count
    pub async fn count(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.as_str());
        sqlx::query_scalar(&sql).fetch_one(pool).await
    }
}

impl fmt::Display for AdminTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminTable {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminTable::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}
