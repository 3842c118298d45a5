/// The API surface the client services depend on
///
/// [`crate::http::RegenClient`] implements it over HTTP. The guard,
/// workspace context, onboarding repository and pollers only see this trait,
/// so tests drive them with in-memory fakes.

use crate::error::Result;
use async_trait::async_trait;
use regen_shared::access::plan::SubscriptionStatus;
use regen_shared::access::SessionUser;
use regen_shared::models::crm::DashboardSummary;
use regen_shared::models::enterprise::Enterprise;
use regen_shared::models::onboarding_progress::{StepResult, SyncOutcome};
use regen_shared::models::seed_job::SeedJob;
use regen_shared::onboarding::{OnboardingFlow, OnboardingProgress};
use regen_shared::workspace::WorkspaceMembership;
use serde::Deserialize;
use uuid::Uuid;

/// Response of `POST /v1/enterprises/:id/claim`
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimResult {
    pub enterprise: Enterprise,

    /// Dashboard of the new workspace
    pub redirect_to: String,
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// `GET /v1/session`; `None` when signed out
    async fn session(&self) -> Result<Option<SessionUser>>;

    /// `GET /v1/subscription`
    async fn subscription(&self) -> Result<SubscriptionStatus>;

    /// `GET /v1/workspaces`, in join order
    async fn workspaces(&self) -> Result<Vec<WorkspaceMembership>>;

    /// `POST /v1/enterprises/:id/claim`; turns a listing into the caller's workspace
    async fn claim_enterprise(&self, enterprise_id: Uuid) -> Result<ClaimResult>;

    /// `GET /v1/workspaces/:id/dashboard`
    async fn dashboard(&self, enterprise_id: Uuid) -> Result<DashboardSummary>;

    /// `GET /v1/onboarding/:flow`; `None` when the server has no copy
    async fn onboarding(&self, flow: OnboardingFlow) -> Result<Option<OnboardingProgress>>;

    /// `POST /v1/onboarding/:flow/steps/:step`
    async fn complete_onboarding_step(&self, flow: OnboardingFlow, step: &str) -> Result<StepResult>;

    /// `PUT /v1/onboarding/:flow`
    async fn sync_onboarding(&self, progress: &OnboardingProgress) -> Result<SyncOutcome>;

    /// `GET /v1/admin/seed-jobs/:id`
    async fn seed_job(&self, id: Uuid) -> Result<SeedJob>;
}
