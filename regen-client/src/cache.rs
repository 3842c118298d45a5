/// Query cache with request coalescing and scoped invalidation
///
/// Every cached query has a key and a [`Scope`]. Concurrent reads of the
/// same key share one in-flight fetch. Invalidating a scope drops its
/// entries and bumps the scope's generation. A fetch that started under an
/// older generation is discarded when it lands: its callers get
/// [`ClientError::Superseded`] and nothing is cached. That is how a
/// workspace switch guarantees no data from the previous workspace is served
/// afterwards, even from requests that were already in flight.
///
/// Values are stored as JSON so one cache can hold every response type.
/// Failed fetches are not cached.

use crate::error::{ClientError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Invalidation group of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Data of the current CRM workspace
    Crm,

    /// Everything else (session, subscription, memberships)
    Global,
}

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: Scope,
    pub path: String,
}

impl QueryKey {
    pub fn crm(path: impl Into<String>) -> Self {
        QueryKey {
            scope: Scope::Crm,
            path: path.into(),
        }
    }

    pub fn global(path: impl Into<String>) -> Self {
        QueryKey {
            scope: Scope::Global,
            path: path.into(),
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<serde_json::Value>>>;

enum Entry {
    Ready(serde_json::Value),
    InFlight { generation: u64, fetch: SharedFetch },
}

fn share<T, Fut>(fut: Fut) -> SharedFetch
where
    T: Serialize + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async move {
        let value = fut.await?;
        Ok(serde_json::to_value(value)?)
    }
    .boxed()
    .shared()
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QueryKey, Entry>,
    generations: HashMap<Scope, u64>,
}

impl Inner {
    fn generation(&self, scope: Scope) -> u64 {
        self.generations.get(&scope).copied().unwrap_or(0)
    }
}

/// Shared query cache
#[derive(Default)]
pub struct QueryCache {
    inner: Mutex<Inner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches it
    ///
    /// `fetch` only runs when no value is cached and no fetch for `key` is
    /// already in flight.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (generation, shared) = {
            let mut inner = self.lock();
            match inner.entries.get(&key) {
                Some(Entry::Ready(value)) => return Ok(serde_json::from_value(value.clone())?),
                Some(Entry::InFlight { generation, fetch: pending }) => (*generation, pending.clone()),
                None => {
                    let generation = inner.generation(key.scope);
                    let shared = share(fetch());

                    inner.entries.insert(
                        key.clone(),
                        Entry::InFlight {
                            generation,
                            fetch: shared.clone(),
                        },
                    );
                    (generation, shared)
                }
            }
        };

        let outcome = shared.await;

        {
            let mut inner = self.lock();
            if inner.generation(key.scope) != generation {
                tracing::debug!(path = %key.path, "Discarding result fetched before invalidation");
                return Err(ClientError::Superseded);
            }

            let still_ours = matches!(
                inner.entries.get(&key),
                Some(Entry::InFlight { generation: g, .. }) if *g == generation
            );
            if still_ours {
                match &outcome {
                    Ok(value) => {
                        inner.entries.insert(key.clone(), Entry::Ready(value.clone()));
                    }
                    Err(_) => {
                        inner.entries.remove(&key);
                    }
                }
            }
        }

        Ok(serde_json::from_value(outcome?)?)
    }

    /// Drops every entry of `scope` and discards its in-flight fetches
    pub fn invalidate(&self, scope: Scope) {
        let mut inner = self.lock();
        *inner.generations.entry(scope).or_insert(0) += 1;
        inner.entries.retain(|key, _| key.scope != scope);
        tracing::debug!(?scope, "Query scope invalidated");
    }

    /// Drops a single entry
    pub fn remove(&self, key: &QueryKey) {
        self.lock().entries.remove(key);
    }

    /// Stores a value without fetching
    pub fn insert<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.lock().entries.insert(key, Entry::Ready(value));
        Ok(())
    }

    /// Whether a value is cached for `key`
    pub fn contains(&self, key: &QueryKey) -> bool {
        matches!(self.lock().entries.get(key), Some(Entry::Ready(_)))
    }
}
