/// Current CRM workspace
///
/// Holds the enterprise the CRM views are scoped to. The selection is
/// persisted under [`CURRENT_WORKSPACE_KEY`] so it survives restarts, and is
/// re-validated against the membership list on every [`WorkspaceContext::load`].
///
/// Switching workspaces publishes the new id and then invalidates every
/// [`Scope::Crm`] query. A CRM query that finishes after the selection moved
/// away from the workspace it was issued for is discarded.

use crate::backend::Backend;
use crate::cache::{QueryCache, QueryKey, Scope};
use crate::error::{ClientError, Result};
use crate::store::{LocalStore, CURRENT_WORKSPACE_KEY};
use regen_shared::models::crm::DashboardSummary;
use regen_shared::workspace::{dashboard_path, resolve_workspace, WorkspaceMembership, WorkspaceResolution};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

pub const WORKSPACES_QUERY: &str = "/workspaces";

pub struct WorkspaceContext<B: Backend> {
    backend: Arc<B>,
    cache: Arc<QueryCache>,
    store: Arc<dyn LocalStore>,
    current: RwLock<Option<WorkspaceMembership>>,
}

impl<B: Backend> WorkspaceContext<B> {
    pub fn new(backend: Arc<B>, cache: Arc<QueryCache>, store: Arc<dyn LocalStore>) -> Self {
        WorkspaceContext {
            backend,
            cache,
            store,
            current: RwLock::new(None),
        }
    }

    /// The selected workspace, if any
    pub fn current(&self) -> Option<WorkspaceMembership> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_id(&self) -> Option<Uuid> {
        self.current().map(|m| m.enterprise_id)
    }

    /// Publishes `membership` and returns the previously selected id
    fn set_current(&self, membership: Option<WorkspaceMembership>) -> Option<Uuid> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, membership).map(|m| m.enterprise_id)
    }

    /// The user's memberships, in join order (cached)
    pub async fn memberships(&self) -> Result<Vec<WorkspaceMembership>> {
        let backend = self.backend.clone();
        self.cache
            .get_or_fetch(QueryKey::global(WORKSPACES_QUERY), move || async move {
                backend.workspaces().await
            })
            .await
    }

    /// Forgets the cached membership list (after a claim or an invitation)
    pub fn memberships_changed(&self) {
        self.cache.remove(&QueryKey::global(WORKSPACES_QUERY));
    }

    fn persisted_id(&self) -> Result<Option<Uuid>> {
        let stored = self.store.get(CURRENT_WORKSPACE_KEY)?;
        Ok(stored.and_then(|s| s.parse().ok()))
    }

    /// Resolves the workspace for this session
    ///
    /// Reuses the persisted selection while the user is still a member,
    /// otherwise falls back to the first membership. With no memberships the
    /// result is [`WorkspaceResolution::NeedsActivation`] whatever the
    /// user's role.
    pub async fn load(&self) -> Result<WorkspaceResolution> {
        let persisted = self.persisted_id()?;
        let memberships = self.memberships().await?;
        let resolution = resolve_workspace(persisted, &memberships);

        match &resolution {
            WorkspaceResolution::Active { membership, .. } => {
                if persisted != Some(membership.enterprise_id) {
                    self.store
                        .set(CURRENT_WORKSPACE_KEY, &membership.enterprise_id.to_string())?;
                }
                let previous = self.set_current(Some(membership.clone()));
                if previous != Some(membership.enterprise_id) {
                    self.cache.invalidate(Scope::Crm);
                }
            }
            WorkspaceResolution::NeedsActivation => {
                self.store.remove(CURRENT_WORKSPACE_KEY)?;
                if self.set_current(None).is_some() {
                    self.cache.invalidate(Scope::Crm);
                }
            }
        }

        Ok(resolution)
    }

    /// Selects `enterprise_id` and returns its dashboard path
    pub async fn switch(&self, enterprise_id: Uuid) -> Result<String> {
        let memberships = self.memberships().await?;
        let membership = memberships
            .into_iter()
            .find(|m| m.enterprise_id == enterprise_id)
            .ok_or(ClientError::NotAMember(enterprise_id))?;

        self.store
            .set(CURRENT_WORKSPACE_KEY, &enterprise_id.to_string())?;
        self.set_current(Some(membership));
        self.cache.invalidate(Scope::Crm);

        tracing::info!(enterprise_id = %enterprise_id, "Switched workspace");
        Ok(dashboard_path(enterprise_id))
    }

    /// Claims a listing and makes it the current workspace
    ///
    /// Returns the dashboard path of the claimed enterprise.
    pub async fn claim(&self, enterprise_id: Uuid) -> Result<String> {
        let claimed = self.backend.claim_enterprise(enterprise_id).await?;
        self.memberships_changed();

        let path = self.switch(claimed.enterprise.id).await?;
        tracing::info!(enterprise_id = %enterprise_id, "Claimed enterprise");
        Ok(path)
    }

    /// Dashboard summary of the current workspace (cached, CRM scope)
    pub async fn dashboard(&self) -> Result<DashboardSummary> {
        let enterprise_id = self.current_id().ok_or(ClientError::NoWorkspace)?;
        let backend = self.backend.clone();

        self.workspace_query(enterprise_id, "dashboard", move || async move {
            backend.dashboard(enterprise_id).await
        })
        .await
    }

    /// Runs a CRM-scoped query for `enterprise_id`
    ///
    /// A result is only handed out while `enterprise_id` is still the
    /// selected workspace. If a switch was published while the query ran,
    /// the caller gets [`ClientError::Superseded`].
    async fn workspace_query<T, F, Fut>(&self, enterprise_id: Uuid, resource: &str, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = QueryKey::crm(format!("/workspaces/{}/{}", enterprise_id, resource));
        let value = self.cache.get_or_fetch(key.clone(), fetch).await?;

        if self.current_id() != Some(enterprise_id) {
            self.cache.remove(&key);
            return Err(ClientError::Superseded);
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;
    use crate::store::MemoryStore;
    use regen_shared::access::roles::UserRole;
    use tokio::sync::Notify;

    struct Fixture {
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
        context: WorkspaceContext<FakeBackend>,
    }

    fn fixture(backend: FakeBackend) -> Fixture {
        let backend = Arc::new(backend);
        let store = Arc::new(MemoryStore::new());
        let context = WorkspaceContext::new(backend.clone(), Arc::new(QueryCache::new()), store.clone());
        Fixture {
            backend,
            store,
            context,
        }
    }

    #[tokio::test]
    async fn test_no_memberships_needs_activation_even_for_admin() {
        let f = fixture(FakeBackend::signed_in(UserRole::Admin));

        let resolution = f.context.load().await.unwrap();
        assert_eq!(resolution, WorkspaceResolution::NeedsActivation);
        assert_eq!(resolution.landing_path(), "/onboarding/claim");
        assert_eq!(f.context.dashboard().await, Err(ClientError::NoWorkspace));
    }

    #[tokio::test]
    async fn test_load_defaults_to_first_and_persists() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        let first = f.backend.add_workspace("Living Soil", 3);
        f.backend.add_workspace("Tidal Energy", 9);

        let resolution = f.context.load().await.unwrap();
        assert_eq!(resolution.enterprise_id(), Some(first));
        assert_eq!(
            f.store.get(CURRENT_WORKSPACE_KEY).unwrap(),
            Some(first.to_string())
        );
    }

    #[tokio::test]
    async fn test_load_reuses_persisted_selection() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        f.backend.add_workspace("Living Soil", 3);
        let second = f.backend.add_workspace("Tidal Energy", 9);
        f.store.set(CURRENT_WORKSPACE_KEY, &second.to_string()).unwrap();

        match f.context.load().await.unwrap() {
            WorkspaceResolution::Active {
                membership,
                reused_cached,
            } => {
                assert_eq!(membership.enterprise_id, second);
                assert!(reused_cached);
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switch_serves_new_workspace_data() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        f.backend.add_workspace("Living Soil", 3);
        let second = f.backend.add_workspace("Tidal Energy", 9);

        f.context.load().await.unwrap();
        assert_eq!(f.context.dashboard().await.unwrap().people, 3);

        let path = f.context.switch(second).await.unwrap();
        assert_eq!(path, format!("/crm/{}/dashboard", second));
        assert_eq!(f.context.dashboard().await.unwrap().people, 9);
        assert_eq!(
            f.store.get(CURRENT_WORKSPACE_KEY).unwrap(),
            Some(second.to_string())
        );
    }

    #[tokio::test]
    async fn test_switch_discards_in_flight_fetch() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        f.backend.add_workspace("Living Soil", 3);
        let second = f.backend.add_workspace("Tidal Energy", 9);
        f.context.load().await.unwrap();

        let gate = Arc::new(Notify::new());
        *f.backend.dashboard_gate.lock().unwrap() = Some(gate.clone());

        let stale = f.context.dashboard();
        let switch = async {
            tokio::task::yield_now().await;
            let path = f.context.switch(second).await;
            *f.backend.dashboard_gate.lock().unwrap() = None;
            gate.notify_one();
            path
        };

        let (stale, path) = tokio::join!(stale, switch);
        assert!(path.is_ok());
        assert_eq!(stale, Err(ClientError::Superseded));
        assert_eq!(f.context.dashboard().await.unwrap().people, 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_query_started_mid_switch_is_discarded() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        f.backend.add_workspace("Living Soil", 3);
        let second = f.backend.add_workspace("Tidal Energy", 9);
        f.context.load().await.unwrap();

        let target = f
            .context
            .memberships()
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.enterprise_id == second)
            .unwrap();

        let gate = Arc::new(Notify::new());
        *f.backend.dashboard_gate.lock().unwrap() = Some(gate.clone());

        // Scope invalidated, new workspace not yet published
        f.context.cache.invalidate(Scope::Crm);
        let stale = f.context.dashboard();
        let publish = async {
            tokio::task::yield_now().await;
            f.context.set_current(Some(target));
            *f.backend.dashboard_gate.lock().unwrap() = None;
            gate.notify_one();
        };

        let (stale, _) = tokio::join!(stale, publish);
        assert_eq!(stale, Err(ClientError::Superseded));
        assert_eq!(f.context.dashboard().await.unwrap().people, 9);
    }

    #[tokio::test]
    async fn test_claim_refreshes_memberships_and_switches() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        f.backend.add_workspace("Living Soil", 3);
        f.context.load().await.unwrap();
        assert_eq!(f.context.memberships().await.unwrap().len(), 1);

        let listing = Uuid::new_v4();
        let path = f.context.claim(listing).await.unwrap();

        assert_eq!(path, format!("/crm/{}/dashboard", listing));
        assert_eq!(f.context.memberships().await.unwrap().len(), 2);
        assert_eq!(f.context.current().map(|m| m.enterprise_id), Some(listing));
        assert_eq!(f.context.dashboard().await.unwrap().people, 0);
        assert_eq!(
            f.store.get(CURRENT_WORKSPACE_KEY).unwrap(),
            Some(listing.to_string())
        );
    }

    #[tokio::test]
    async fn test_claim_of_own_workspace_conflicts() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        let mine = f.backend.add_workspace("Living Soil", 3);
        f.context.load().await.unwrap();

        match f.context.claim(mine).await {
            Err(ClientError::Api { status, .. }) => assert_eq!(status, 409),
            other => panic!("unexpected claim result: {:?}", other),
        }
        assert_eq!(f.context.memberships().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_switch_to_foreign_workspace_rejected() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        let mine = f.backend.add_workspace("Living Soil", 3);
        f.context.load().await.unwrap();

        let stranger = Uuid::new_v4();
        assert_eq!(
            f.context.switch(stranger).await,
            Err(ClientError::NotAMember(stranger))
        );
        assert_eq!(f.context.current().map(|m| m.enterprise_id), Some(mine));
    }

    #[tokio::test]
    async fn test_lost_membership_falls_back() {
        let f = fixture(FakeBackend::signed_in(UserRole::EnterpriseOwner));
        let first = f.backend.add_workspace("Living Soil", 3);
        f.store
            .set(CURRENT_WORKSPACE_KEY, &Uuid::new_v4().to_string())
            .unwrap();

        let resolution = f.context.load().await.unwrap();
        assert_eq!(resolution.enterprise_id(), Some(first));
    }
}
