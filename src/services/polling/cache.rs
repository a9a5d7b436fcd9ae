use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::PollError;
use super::snapshot::SubjectId;

/// Key of a cached remote resource: `<collection>/<subject>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(collection: &str, subject: &SubjectId) -> Self {
        Self(format!("{}/{}", collection, subject))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type SharedFetch<S> = Shared<BoxFuture<'static, Result<S, PollError>>>;

struct CacheState<S> {
    in_flight: HashMap<CacheKey, SharedFetch<S>>,
    latest: HashMap<CacheKey, S>,
}

/// Request-deduplicating cache shared by every poll session of one snapshot type.
///
/// At most one fetch per key is in flight; callers that arrive while it runs
/// join it and receive the same result. The last successful value per key is
/// kept so new sessions can show it before their first response.
pub struct RevalidationCache<S> {
    state: Arc<Mutex<CacheState<S>>>,
}

impl<S> Clone for RevalidationCache<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S> Default for RevalidationCache<S> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                in_flight: HashMap::new(),
                latest: HashMap::new(),
            })),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> RevalidationCache<S> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<S>> {
        // State stays consistent across a panic in another holder: every
        // mutation is a single map insert/remove.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `fetch` for `key`, or join the fetch already in flight for it
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<S, PollError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, PollError>> + Send + 'static,
    {
        let shared = {
            let mut state = self.lock();
            match state.in_flight.get(key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let fut = fetch().boxed().shared();
                    state.in_flight.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        let mut state = self.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            state.in_flight.remove(key);
        }
        if let Ok(value) = &result {
            state.latest.insert(key.clone(), value.clone());
        }

        result
    }

    /// Last successful value fetched for `key`
    pub fn latest(&self, key: &CacheKey) -> Option<S> {
        self.lock().latest.get(key).cloned()
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.lock().latest.remove(key);
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }
}
