/// Onboarding progress repository
///
/// One place for the two-tier onboarding store. The server copy is
/// authoritative for signed-in users; the local store keeps visitors'
/// progress and covers offline use. On load the two copies are reconciled
/// by last write wins on `updated_at`. A newer local copy is pushed to the
/// server, and whichever copy wins is written back locally.

use crate::backend::Backend;
use crate::error::{ClientError, Result};
use crate::poll::poll_until;
use crate::store::LocalStore;
use chrono::Utc;
use regen_shared::onboarding::{
    reconcile, OnboardingError, OnboardingFlow, OnboardingProgress, ProgressSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct OnboardingRepository<B: Backend> {
    backend: Arc<B>,
    store: Arc<dyn LocalStore>,
}

/// Server copy, or why there isn't one
enum ServerCopy {
    Found(Option<OnboardingProgress>),
    SignedOut,
    Unreachable,
}

impl<B: Backend> OnboardingRepository<B> {
    pub fn new(backend: Arc<B>, store: Arc<dyn LocalStore>) -> Self {
        OnboardingRepository { backend, store }
    }

    fn read_local(&self, flow: OnboardingFlow) -> Result<Option<OnboardingProgress>> {
        let Some(raw) = self.store.get(&flow.storage_key())? else {
            return Ok(None);
        };

        match serde_json::from_str::<OnboardingProgress>(&raw) {
            Ok(progress) if progress.flow == flow => Ok(Some(progress.normalized())),
            Ok(_) | Err(_) => {
                tracing::warn!(flow = %flow, "Discarding unreadable local onboarding progress");
                Ok(None)
            }
        }
    }

    fn write_local(&self, progress: &OnboardingProgress) -> Result<()> {
        let raw = serde_json::to_string(progress)?;
        self.store.set(&progress.flow.storage_key(), &raw)
    }

    async fn server_copy(&self, flow: OnboardingFlow) -> ServerCopy {
        match self.backend.onboarding(flow).await {
            Ok(progress) => ServerCopy::Found(progress),
            Err(ClientError::Unauthenticated) => ServerCopy::SignedOut,
            Err(e) => {
                tracing::warn!(flow = %flow, error = %e, "Onboarding server copy unavailable");
                ServerCopy::Unreachable
            }
        }
    }

    /// Current progress for `flow`
    ///
    /// Never fails because the server is unreachable; local progress (or a
    /// fresh record) is returned instead.
    pub async fn load(&self, flow: OnboardingFlow) -> Result<OnboardingProgress> {
        let local = self.read_local(flow)?;
        let (server, online) = match self.server_copy(flow).await {
            ServerCopy::Found(progress) => (progress, true),
            ServerCopy::SignedOut | ServerCopy::Unreachable => (None, false),
        };

        let Some((progress, source)) = reconcile(server, local) else {
            return Ok(OnboardingProgress::new(flow, Utc::now()));
        };

        if source == ProgressSource::Local && online {
            match self.backend.sync_onboarding(&progress).await {
                Ok(outcome) => {
                    self.write_local(&outcome.stored)?;
                    return Ok(outcome.stored);
                }
                Err(e) => {
                    tracing::warn!(flow = %flow, error = %e, "Failed to push local onboarding progress");
                }
            }
        }

        self.write_local(&progress)?;
        Ok(progress)
    }

    /// Marks `step` done
    ///
    /// Goes to the server when possible. Signed-out or offline callers
    /// record the step locally; it is pushed on the next online load.
    /// Completing a step twice changes nothing.
    pub async fn complete_step(&self, flow: OnboardingFlow, step: &str) -> Result<OnboardingProgress> {
        if !flow.steps().contains(&step) {
            return Err(OnboardingError::UnknownStep {
                flow,
                step: step.to_string(),
            }
            .into());
        }

        match self.backend.complete_onboarding_step(flow, step).await {
            Ok(result) => {
                self.write_local(&result.progress)?;
                Ok(result.progress)
            }
            Err(e @ ClientError::Api { .. }) => Err(e),
            Err(e) => {
                tracing::debug!(flow = %flow, step, error = %e, "Recording onboarding step locally");

                let mut progress = self
                    .read_local(flow)?
                    .unwrap_or_else(|| OnboardingProgress::new(flow, Utc::now()));
                if progress.complete_step(step, Utc::now())? {
                    self.write_local(&progress)?;
                }
                Ok(progress)
            }
        }
    }

    /// Polls the server copy until the flow is completed
    pub async fn wait_until_complete(
        &self,
        flow: OnboardingFlow,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<OnboardingProgress> {
        let progress = poll_until(
            interval,
            cancel,
            || self.backend.onboarding(flow),
            |progress: &Option<OnboardingProgress>| progress.as_ref().map_or(false, |p| p.completed),
        )
        .await?;

        progress.ok_or(ClientError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use regen_shared::access::roles::UserRole;
    use std::sync::atomic::Ordering;

    struct Fixture {
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
        repo: OnboardingRepository<FakeBackend>,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let backend = Arc::new(backend);
        let store = Arc::new(MemoryStore::new());
        let repo = OnboardingRepository::new(backend.clone(), store.clone());
        Fixture { backend, store, repo }
    }

    fn local_copy(store: &MemoryStore, flow: OnboardingFlow) -> Option<OnboardingProgress> {
        store
            .get(&flow.storage_key())
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_visitor_progress_stays_local() {
        let f = fixture(FakeBackend::signed_out());

        let progress = f
            .repo
            .complete_step(OnboardingFlow::Directory, "browse_directory")
            .await
            .unwrap();
        assert!(progress.is_step_complete("browse_directory"));

        let stored = local_copy(&f.store, OnboardingFlow::Directory).unwrap();
        assert_eq!(stored, progress);

        let loaded = f.repo.load(OnboardingFlow::Directory).await.unwrap();
        assert_eq!(loaded, progress);
    }

    #[tokio::test]
    async fn test_completing_twice_leaves_record_unchanged() {
        let f = fixture(FakeBackend::signed_out());

        let first = f
            .repo
            .complete_step(OnboardingFlow::Crm, "claim_enterprise")
            .await
            .unwrap();
        let second = f
            .repo
            .complete_step(OnboardingFlow::Crm, "claim_enterprise")
            .await
            .unwrap();

        assert_eq!(first.updated_at, second.updated_at);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_step_rejected_before_any_request() {
        let f = fixture(FakeBackend::signed_in(UserRole::Member));

        let err = f
            .repo
            .complete_step(OnboardingFlow::Directory, "claim_enterprise")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Onboarding(_)));
        assert!(f.backend.onboarding.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_newer_local_copy_is_pushed() {
        let f = fixture(FakeBackend::signed_in(UserRole::Member));
        let flow = OnboardingFlow::Crm;
        let now = Utc::now();

        f.backend
            .onboarding
            .lock()
            .unwrap()
            .insert(flow, OnboardingProgress::new(flow, now - ChronoDuration::hours(1)));

        let mut local = OnboardingProgress::new(flow, now - ChronoDuration::hours(2));
        local.complete_step("claim_enterprise", now).unwrap();
        f.store
            .set(&flow.storage_key(), &serde_json::to_string(&local).unwrap())
            .unwrap();

        let loaded = f.repo.load(flow).await.unwrap();
        assert!(loaded.is_step_complete("claim_enterprise"));
        assert_eq!(f.backend.onboarding.lock().unwrap()[&flow], local);
    }

    #[tokio::test]
    async fn test_newer_server_copy_overwrites_local() {
        let f = fixture(FakeBackend::signed_in(UserRole::Member));
        let flow = OnboardingFlow::Directory;
        let now = Utc::now();

        let local = OnboardingProgress::new(flow, now - ChronoDuration::hours(3));
        f.store
            .set(&flow.storage_key(), &serde_json::to_string(&local).unwrap())
            .unwrap();

        let mut server = OnboardingProgress::new(flow, now - ChronoDuration::hours(3));
        server.complete_step("view_enterprise", now).unwrap();
        f.backend.onboarding.lock().unwrap().insert(flow, server.clone());

        assert_eq!(f.repo.load(flow).await.unwrap(), server);
        assert_eq!(local_copy(&f.store, flow), Some(server));
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_local() {
        let f = fixture(FakeBackend::signed_in(UserRole::Member));
        f.backend.offline.store(true, Ordering::SeqCst);

        let progress = f
            .repo
            .complete_step(OnboardingFlow::Directory, "create_account")
            .await
            .unwrap();
        assert!(progress.is_step_complete("create_account"));

        let loaded = f.repo.load(OnboardingFlow::Directory).await.unwrap();
        assert_eq!(loaded, progress);
    }

    #[tokio::test]
    async fn test_corrupt_local_copy_ignored() {
        let f = fixture(FakeBackend::signed_out());
        f.store
            .set(&OnboardingFlow::Crm.storage_key(), "{not json")
            .unwrap();

        let progress = f.repo.load(OnboardingFlow::Crm).await.unwrap();
        assert!(!progress.completed);
        assert_eq!(progress.remaining_steps().len(), OnboardingFlow::Crm.steps().len());
    }
}
