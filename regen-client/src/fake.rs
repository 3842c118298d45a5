//! In-memory [`Backend`] for unit tests

use crate::backend::{Backend, ClaimResult};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use chrono::Utc;
use regen_shared::access::plan::SubscriptionStatus;
use regen_shared::access::roles::UserRole;
use regen_shared::access::SessionUser;
use regen_shared::models::crm::DashboardSummary;
use regen_shared::models::enterprise::{Enterprise, EnterpriseCategory};
use regen_shared::models::enterprise_member::TeamRole;
use regen_shared::models::onboarding_progress::{StepResult, SyncOutcome};
use regen_shared::models::seed_job::SeedJob;
use regen_shared::onboarding::{OnboardingFlow, OnboardingProgress};
use regen_shared::workspace::{dashboard_path, WorkspaceMembership};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

pub(crate) struct FakeBackend {
    pub user: Mutex<Option<SessionUser>>,
    pub subscription: Mutex<SubscriptionStatus>,
    pub memberships: Mutex<Vec<WorkspaceMembership>>,
    pub dashboards: Mutex<HashMap<Uuid, i64>>,
    pub dashboard_gate: Mutex<Option<Arc<Notify>>>,
    pub onboarding: Mutex<HashMap<OnboardingFlow, OnboardingProgress>>,
    pub seed_jobs: Mutex<VecDeque<SeedJob>>,
    pub offline: AtomicBool,
    pub session_calls: AtomicUsize,
    pub seed_job_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn signed_out() -> Self {
        FakeBackend {
            user: Mutex::new(None),
            subscription: Mutex::new(SubscriptionStatus::free(0)),
            memberships: Mutex::new(Vec::new()),
            dashboards: Mutex::new(HashMap::new()),
            dashboard_gate: Mutex::new(None),
            onboarding: Mutex::new(HashMap::new()),
            seed_jobs: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
            session_calls: AtomicUsize::new(0),
            seed_job_calls: AtomicUsize::new(0),
        }
    }

    pub fn signed_in(role: UserRole) -> Self {
        let backend = Self::signed_out();
        *backend.user.lock().unwrap() =
            Some(SessionUser::new(Uuid::new_v4(), "grower@example.org", role));
        backend
    }

    /// Adds a workspace whose dashboard reports `people` contacts
    pub fn add_workspace(&self, name: &str, people: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.memberships.lock().unwrap().push(WorkspaceMembership {
            enterprise_id: id,
            enterprise_name: name.to_string(),
            team_role: TeamRole::Owner,
            joined_at: Utc::now(),
        });
        self.dashboards.lock().unwrap().insert(id, people);
        id
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_signed_in(&self) -> Result<()> {
        self.check_online()?;
        if self.user.lock().unwrap().is_none() {
            return Err(ClientError::Unauthenticated);
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn session(&self) -> Result<Option<SessionUser>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.user.lock().unwrap().clone())
    }

    async fn subscription(&self) -> Result<SubscriptionStatus> {
        self.check_signed_in()?;
        Ok(self.subscription.lock().unwrap().clone())
    }

    async fn workspaces(&self) -> Result<Vec<WorkspaceMembership>> {
        self.check_signed_in()?;
        Ok(self.memberships.lock().unwrap().clone())
    }

    async fn claim_enterprise(&self, enterprise_id: Uuid) -> Result<ClaimResult> {
        self.check_signed_in()?;
        let user_id = self.user.lock().unwrap().as_ref().map(|u| u.id);

        let mut memberships = self.memberships.lock().unwrap();
        if memberships.iter().any(|m| m.enterprise_id == enterprise_id) {
            return Err(ClientError::Api {
                status: 409,
                error: "conflict".to_string(),
                message: "Enterprise already claimed".to_string(),
            });
        }

        let now = Utc::now();
        memberships.push(WorkspaceMembership {
            enterprise_id,
            enterprise_name: "Claimed Listing".to_string(),
            team_role: TeamRole::Owner,
            joined_at: now,
        });
        self.dashboards.lock().unwrap().insert(enterprise_id, 0);

        Ok(ClaimResult {
            enterprise: Enterprise {
                id: enterprise_id,
                name: "Claimed Listing".to_string(),
                description: None,
                category: EnterpriseCategory::Other,
                location: None,
                website: None,
                verified: false,
                claimed_by: user_id,
                claimed_at: Some(now),
                created_at: now,
                updated_at: now,
            },
            redirect_to: dashboard_path(enterprise_id),
        })
    }

    async fn dashboard(&self, enterprise_id: Uuid) -> Result<DashboardSummary> {
        self.check_signed_in()?;

        let gate = self.dashboard_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let people = self
            .dashboards
            .lock()
            .unwrap()
            .get(&enterprise_id)
            .copied()
            .ok_or(ClientError::Api {
                status: 403,
                error: "forbidden".to_string(),
                message: "Not a member".to_string(),
            })?;

        Ok(DashboardSummary {
            people,
            open_opportunities: 0,
            pipeline_value_cents: 0,
            open_tasks: 0,
            overdue_tasks: 0,
        })
    }

    async fn onboarding(&self, flow: OnboardingFlow) -> Result<Option<OnboardingProgress>> {
        self.check_signed_in()?;
        Ok(self.onboarding.lock().unwrap().get(&flow).cloned())
    }

    async fn complete_onboarding_step(&self, flow: OnboardingFlow, step: &str) -> Result<StepResult> {
        self.check_signed_in()?;

        let mut stored = self.onboarding.lock().unwrap();
        let progress = stored
            .entry(flow)
            .or_insert_with(|| OnboardingProgress::new(flow, Utc::now()));
        let changed = progress.complete_step(step, Utc::now())?;

        Ok(StepResult {
            progress: progress.clone(),
            changed,
        })
    }

    async fn sync_onboarding(&self, incoming: &OnboardingProgress) -> Result<SyncOutcome> {
        self.check_signed_in()?;

        let mut stored = self.onboarding.lock().unwrap();
        let accepted = stored
            .get(&incoming.flow)
            .map_or(true, |current| incoming.updated_at > current.updated_at);
        if accepted {
            stored.insert(incoming.flow, incoming.clone());
        }

        Ok(SyncOutcome {
            stored: stored[&incoming.flow].clone(),
            accepted,
        })
    }

    async fn seed_job(&self, id: Uuid) -> Result<SeedJob> {
        self.seed_job_calls.fetch_add(1, Ordering::SeqCst);
        self.check_signed_in()?;

        let mut jobs = self.seed_jobs.lock().unwrap();
        let job = if jobs.len() > 1 {
            jobs.pop_front()
        } else {
            jobs.front().cloned()
        };

        job.filter(|j| j.id == id).ok_or(ClientError::Api {
            status: 404,
            error: "not_found".to_string(),
            message: "Seed job not found".to_string(),
        })
    }
}
