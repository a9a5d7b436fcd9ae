use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use super::cache::{CacheKey, RevalidationCache};
use super::fetcher::StatusFetcher;
use super::policy::PollPolicy;
use super::session::{PollSession, PollStatus, SessionPhase, TickOutcome};
use super::snapshot::{Snapshot, SubjectId};
use super::visibility::Visibility;
use crate::services::metrics::PollMetricsCollector;

/// Invoked once with the terminal snapshot of a session
pub type CompletionCallback<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct Inner<S: Snapshot> {
    label: String,
    session: Mutex<PollSession<S>>,
    status_tx: watch::Sender<PollStatus<S>>,
    generation_tx: watch::Sender<u64>,
    fetcher: Arc<dyn StatusFetcher<S>>,
    cache: RevalidationCache<S>,
    visibility: Visibility,
    on_complete: Option<CompletionCallback<S>>,
    metrics: Option<PollMetricsCollector>,
}

impl<S: Snapshot> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, PollSession<S>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Must be called with the session lock held so updates publish in order
    fn publish(&self, session: &PollSession<S>) {
        self.status_tx.send_replace(session.status());
    }

    fn key_for(&self, subject: &SubjectId) -> CacheKey {
        CacheKey::new(self.fetcher.collection(), subject)
    }

    fn record_finished(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_session_finished(&self.label, reason);
        }
    }
}

/// Drives one poll session against a remote status endpoint.
///
/// The first tick runs as soon as polling starts; later ticks wait the
/// policy interval. A session ends on the first terminal snapshot, when the
/// retry ceiling is reached, or on `stop_polling`. Fetch failures are
/// exposed through `PollStatus::error` and never surface as panics or errors
/// to the caller.
///
/// Spawns onto the current tokio runtime, so `start`/`start_polling` (and
/// `build` with `poll_on_mount`) must be called from within one.
pub struct PollController<S: Snapshot> {
    inner: Arc<Inner<S>>,
    subject: Option<String>,
}

impl<S: Snapshot> PollController<S> {
    pub fn builder(fetcher: Arc<dyn StatusFetcher<S>>) -> PollControllerBuilder<S> {
        PollControllerBuilder::new(fetcher)
    }

    /// Start polling the subject configured on the builder
    pub fn start_polling(&self) -> bool {
        match self.subject.clone() {
            Some(subject) => self.start(&subject),
            None => {
                tracing::debug!(
                    label = %self.inner.label,
                    "No subject configured, poller stays idle"
                );
                false
            }
        }
    }

    /// Start (or restart) polling `subject`. Returns false when the subject
    /// is empty, in which case no fetch is issued.
    pub fn start(&self, subject: &str) -> bool {
        let generation = {
            let mut session = self.inner.lock();
            let was_polling = session.is_polling();

            let Some(generation) = session.start(subject) else {
                tracing::debug!(label = %self.inner.label, "Empty subject, poller stays idle");
                return false;
            };

            if let Some(cached) = session
                .subject()
                .map(|s| self.inner.key_for(s))
                .and_then(|key| self.inner.cache.latest(&key))
            {
                session.seed(cached);
            }

            tracing::info!(
                label = %self.inner.label,
                session_id = ?session.session_id(),
                subject = %subject.trim(),
                interval_ms = session.interval().as_millis() as u64,
                max_retries = session.policy().max_retries,
                "Polling started"
            );

            if !was_polling {
                if let Some(metrics) = &self.inner.metrics {
                    metrics.record_session_started(&self.inner.label);
                }
            }

            self.inner.generation_tx.send_replace(generation);
            self.inner.publish(&session);
            generation
        };

        tokio::spawn(drive(self.inner.clone(), generation));
        true
    }

    /// Stop polling. A fetch already in flight is left to finish but its
    /// result is discarded. Calling this on a stopped session is a no-op.
    pub fn stop_polling(&self) {
        let mut session = self.inner.lock();
        if !session.stop() {
            return;
        }

        tracing::info!(
            label = %self.inner.label,
            session_id = ?session.session_id(),
            retry_count = session.retry_count(),
            "Polling stopped"
        );

        self.inner.generation_tx.send_replace(session.generation());
        self.inner.publish(&session);
        self.inner.record_finished("stopped");
    }

    pub fn status(&self) -> PollStatus<S> {
        self.inner.status_tx.borrow().clone()
    }

    /// Receiver of every status update
    pub fn subscribe(&self) -> watch::Receiver<PollStatus<S>> {
        self.inner.status_tx.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.status_tx.borrow().is_polling
    }

    pub fn latest_status(&self) -> Option<S> {
        self.inner.status_tx.borrow().latest_status.clone()
    }

    /// Wait until the session leaves the polling phase and return its final status
    pub async fn finished(&self) -> PollStatus<S> {
        let mut rx = self.subscribe();
        loop {
            let status = rx.borrow_and_update().clone();
            if !status.is_polling {
                return status;
            }
            if rx.changed().await.is_err() {
                return status;
            }
        }
    }
}

impl<S: Snapshot> Drop for PollController<S> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

/// Resolves once the controller moved past `generation`
async fn superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        let current = *rx.borrow_and_update();
        if current != generation {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn drive<S: Snapshot>(inner: Arc<Inner<S>>, generation: u64) {
    let mut generation_rx = inner.generation_tx.subscribe();

    let (subject, session_id) = {
        let session = inner.lock();
        match session.subject() {
            Some(subject) if session.generation() == generation => {
                (subject.clone(), session.session_id())
            }
            _ => return,
        }
    };
    let key = inner.key_for(&subject);
    let mut delay = Duration::ZERO;

    loop {
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = superseded(&mut generation_rx, generation) => return,
            }
        }

        if !inner.visibility.is_visible() {
            tracing::debug!(label = %inner.label, ?session_id, "Host hidden, tick suspended");
            tokio::select! {
                _ = inner.visibility.wait_visible() => {}
                _ = superseded(&mut generation_rx, generation) => return,
            }
        }

        let tick = {
            let mut session = inner.lock();
            let tick = session.begin_tick(generation);
            if tick.is_none() && session.phase() == SessionPhase::Exhausted {
                inner.record_finished("exhausted");
            }
            inner.publish(&session);
            tick
        };
        let Some(tick) = tick else {
            return;
        };

        tracing::debug!(
            label = %inner.label,
            ?session_id,
            key = %key,
            attempt = tick.attempt,
            "Poll tick"
        );

        let started = Instant::now();
        let fetcher = inner.fetcher.clone();
        let fetch_subject = subject.clone();
        let result = inner
            .cache
            .fetch(&key, move || async move { fetcher.fetch(&fetch_subject).await })
            .await;

        if let Some(metrics) = &inner.metrics {
            let outcome = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics.record_fetch(&inner.label, outcome, started.elapsed().as_secs_f64());
        }
        if let Err(e) = &result {
            tracing::warn!(
                label = %inner.label,
                ?session_id,
                attempt = tick.attempt,
                error = %e,
                "Poll fetch failed"
            );
        }

        let outcome = {
            let mut session = inner.lock();
            let outcome = session.complete_tick(tick, result);
            if !matches!(outcome, TickOutcome::Stale) {
                inner.publish(&session);
            }
            outcome
        };

        match outcome {
            TickOutcome::Stale => {
                tracing::debug!(label = %inner.label, ?session_id, "Discarded late poll result");
                return;
            }
            TickOutcome::Continue(next) => {
                delay = next;
            }
            TickOutcome::Completed(snapshot) => {
                tracing::info!(
                    label = %inner.label,
                    ?session_id,
                    attempts = tick.attempt,
                    message = %snapshot.message(),
                    "Terminal status observed"
                );
                inner.record_finished("completed");
                if let Some(callback) = &inner.on_complete {
                    callback(&snapshot);
                }
                return;
            }
            TickOutcome::Exhausted => {
                tracing::info!(
                    label = %inner.label,
                    ?session_id,
                    attempts = tick.attempt,
                    "Retry ceiling reached, polling gave up"
                );
                inner.record_finished("exhausted");
                return;
            }
        }
    }
}

/// Configures a [`PollController`]
pub struct PollControllerBuilder<S: Snapshot> {
    fetcher: Arc<dyn StatusFetcher<S>>,
    label: String,
    subject: Option<String>,
    policy: PollPolicy,
    fallback: Option<S>,
    cache: Option<RevalidationCache<S>>,
    visibility: Option<Visibility>,
    on_complete: Option<CompletionCallback<S>>,
    metrics: Option<PollMetricsCollector>,
}

impl<S: Snapshot> PollControllerBuilder<S> {
    fn new(fetcher: Arc<dyn StatusFetcher<S>>) -> Self {
        let label = fetcher.collection().to_string();
        Self {
            fetcher,
            label,
            subject: None,
            policy: PollPolicy::default(),
            fallback: None,
            cache: None,
            visibility: None,
            on_complete: None,
            metrics: None,
        }
    }

    /// Name used in logs and metric labels (defaults to the collection)
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Snapshot exposed before the first successful fetch
    pub fn fallback(mut self, fallback: S) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Share a dedup cache with other controllers (a private one is used otherwise)
    pub fn cache(mut self, cache: RevalidationCache<S>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn metrics(mut self, metrics: PollMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> PollController<S> {
        let poll_on_mount = self.policy.poll_on_mount;
        let session = PollSession::new(self.policy, self.fallback);
        let (status_tx, _) = watch::channel(session.status());
        let (generation_tx, _) = watch::channel(session.generation());

        let controller = PollController {
            inner: Arc::new(Inner {
                label: self.label,
                session: Mutex::new(session),
                status_tx,
                generation_tx,
                fetcher: self.fetcher,
                cache: self.cache.unwrap_or_default(),
                visibility: self.visibility.unwrap_or_default(),
                on_complete: self.on_complete,
                metrics: self.metrics,
            }),
            subject: self.subject,
        };

        if poll_on_mount {
            controller.start_polling();
        }
        controller
    }
}
