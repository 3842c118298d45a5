/// CRM records scoped to a workspace
///
/// People, opportunities and tasks all belong to exactly one enterprise and
/// every query here filters on `enterprise_id` first. Callers must have
/// checked the caller's team role for that enterprise before reaching this
/// module; nothing here looks at users.
///
/// Deleting an enterprise cascades to its records. Deleting a person or an
/// opportunity only clears the optional links pointing at it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Pipeline stage of an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "opportunity_stage", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl OpportunityStage {
    /// Won or lost
    pub fn is_closed(&self) -> bool {
        matches!(self, OpportunityStage::Won | OpportunityStage::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Done,
}

/// A contact
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
    pub id: Uuid,
    pub enterprise_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A deal in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Opportunity {
    pub id: Uuid,
    pub enterprise_id: Uuid,
    pub person_id: Option<Uuid>,
    pub title: String,
    pub stage: OpportunityStage,
    pub value_cents: i64,
    pub expected_close: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A follow-up item, optionally linked to a person and/or opportunity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrmTask {
    pub id: Uuid,
    pub enterprise_id: Uuid,
    pub person_id: Option<Uuid>,
    pub opportunity_id: Option<Uuid>,
    pub title: String,
    pub status: TaskStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Paging for workspace lists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

impl Person {
    pub async fn list_by_enterprise(
        pool: &PgPool,
        enterprise_id: Uuid,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Person>(
            r#"
            SELECT id, enterprise_id, full_name, email, phone, title, created_at, updated_at
            FROM people
            WHERE enterprise_id = $1
            ORDER BY full_name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(enterprise_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }
}

impl Opportunity {
    pub async fn list_by_enterprise(
        pool: &PgPool,
        enterprise_id: Uuid,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Opportunity>(
            r#"
            SELECT id, enterprise_id, person_id, title, stage, value_cents, expected_close,
                   created_at, updated_at
            FROM opportunities
            WHERE enterprise_id = $1
            ORDER BY updated_at DESC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(enterprise_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }
}

impl CrmTask {
    /// Open tasks first, soonest due first
    pub async fn list_by_enterprise(
        pool: &PgPool,
        enterprise_id: Uuid,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CrmTask>(
            r#"
            SELECT id, enterprise_id, person_id, opportunity_id, title, status, due_at,
                   created_at, updated_at
            FROM tasks
            WHERE enterprise_id = $1
            ORDER BY status ASC, due_at ASC NULLS LAST, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(enterprise_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }
}

/// Headline numbers for a workspace dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardSummary {
    pub people: i64,
    pub open_opportunities: i64,

    /// Sum of `value_cents` over open opportunities
    pub pipeline_value_cents: i64,

    pub open_tasks: i64,

    /// Open tasks whose due date has passed
    pub overdue_tasks: i64,
}

impl DashboardSummary {
    pub async fn for_enterprise(pool: &PgPool, enterprise_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM people WHERE enterprise_id = $1) AS people,
                (SELECT COUNT(*) FROM opportunities
                  WHERE enterprise_id = $1 AND stage NOT IN ('won', 'lost')) AS open_opportunities,
                (SELECT COALESCE(SUM(value_cents), 0)::BIGINT FROM opportunities
                  WHERE enterprise_id = $1 AND stage NOT IN ('won', 'lost')) AS pipeline_value_cents,
                (SELECT COUNT(*) FROM tasks
                  WHERE enterprise_id = $1 AND status = 'open') AS open_tasks,
                (SELECT COUNT(*) FROM tasks
                  WHERE enterprise_id = $1 AND status = 'open' AND due_at < NOW()) AS overdue_tasks
            "#,
        )
        .bind(enterprise_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::default().limit(), 50);
        assert_eq!(Page { limit: Some(10_000), offset: Some(-1) }.limit(), 200);
        assert_eq!(Page { limit: None, offset: Some(-1) }.offset(), 0);
    }

    #[test]
    fn test_closed_stages() {
        assert!(OpportunityStage::Won.is_closed());
        assert!(OpportunityStage::Lost.is_closed());
        assert!(!OpportunityStage::Negotiation.is_closed());
    }
}
