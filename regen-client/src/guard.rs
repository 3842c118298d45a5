/// Route guard state machine
///
/// Drives the shared guard rules from the client side. Each [`RouteGuard::check`]
/// starts in [`GuardState::Loading`], waits on the (cached) session fetch,
/// and settles on `Authorized` or `Unauthorized { redirect_to }`. Views
/// subscribe to the state through a `watch` channel and render nothing until
/// it leaves `Loading`.
///
/// A failed session fetch counts as signed out and sends the caller to the
/// landing page. There is no retry. The subscription is only fetched for
/// plan-gated paths; if that fetch fails the caller is treated as being on
/// the free plan.
///
/// Every check re-evaluates. Call [`RouteGuard::session_changed`] after
/// sign-in, sign-out or a role change so the next check sees fresh data.

use crate::backend::Backend;
use crate::cache::{QueryCache, QueryKey};
use regen_shared::access::guard::{evaluate_plan, evaluate_role, rule_for, GuardState, SessionFetch};
use regen_shared::access::plan::SubscriptionStatus;
use regen_shared::access::SessionUser;
use std::sync::Arc;
use tokio::sync::watch;

pub const SESSION_QUERY: &str = "/session";
pub const SUBSCRIPTION_QUERY: &str = "/subscription";

pub struct RouteGuard<B: Backend> {
    backend: Arc<B>,
    cache: Arc<QueryCache>,
    state: watch::Sender<GuardState>,
}

impl<B: Backend> RouteGuard<B> {
    pub fn new(backend: Arc<B>, cache: Arc<QueryCache>) -> Self {
        let (state, _) = watch::channel(GuardState::Loading);
        RouteGuard {
            backend,
            cache,
            state,
        }
    }

    /// Receiver for state changes
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    /// Latest decision
    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    /// Evaluates the guard for `path`
    pub async fn check(&self, path: &str) -> GuardState {
        self.state.send_replace(GuardState::Loading);

        let session = self.session().await;
        let fetch = match &session {
            Ok(user) => SessionFetch::Resolved(user.as_ref()),
            Err(e) => {
                tracing::warn!(error = %e, path, "Session fetch failed, treating as signed out");
                SessionFetch::Failed
            }
        };

        let decision = match evaluate_role(fetch, path) {
            GuardState::Authorized if rule_for(path).plan.is_some() => {
                let subscription = self.subscription().await;
                evaluate_plan(Some(&subscription), path)
            }
            other => other,
        };

        tracing::debug!(path, decision = ?decision, "Route guard evaluated");
        self.state.send_replace(decision.clone());
        decision
    }

    /// Forgets the cached session and subscription
    pub fn session_changed(&self) {
        self.cache.remove(&QueryKey::global(SESSION_QUERY));
        self.cache.remove(&QueryKey::global(SUBSCRIPTION_QUERY));
    }

    async fn session(&self) -> crate::error::Result<Option<SessionUser>> {
        let backend = self.backend.clone();
        self.cache
            .get_or_fetch(QueryKey::global(SESSION_QUERY), move || async move {
                backend.session().await
            })
            .await
    }

    async fn subscription(&self) -> SubscriptionStatus {
        let backend = self.backend.clone();
        let result = self
            .cache
            .get_or_fetch(QueryKey::global(SUBSCRIPTION_QUERY), move || async move {
                backend.subscription().await
            })
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Subscription fetch failed, assuming free plan");
            SubscriptionStatus::free(0)
        })
    }
}
