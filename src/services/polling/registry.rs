use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use validator::Validate;

use super::cache::{CacheKey, RevalidationCache};
use super::controller::PollController;
use super::fetcher::{HttpStatusFetcher, StatusFetcher};
use super::policy::PollPolicy;
use super::session::PollStatus;
use super::snapshot::{Snapshot, StatusSnapshot, SubjectId, SubjectKind};
use super::visibility::Visibility;
use crate::services::metrics::PollMetricsCollector;

type SessionKey = (SubjectKind, SubjectId);

/// Finished sessions kept for status reads before the oldest are evicted
pub const DEFAULT_RETAINED_FINISHED: usize = 256;

struct SessionEntry {
    controller: Arc<PollController<StatusSnapshot>>,
    started_at: Instant,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Subject id must not be empty, `.` or `..`")]
    InvalidSubject,
    #[error("Invalid poll policy: {0}")]
    InvalidPolicy(String),
}

/// Per-start overrides coming from the dashboard
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub token: Option<String>,
    pub refresh_interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Owns the poll controllers started through the HTTP control surface.
///
/// One controller per (kind, subject). All of them share one dedup cache and
/// the dashboard visibility handle. Finished sessions stay readable until more
/// than `retained_finished` of them pile up; the oldest are then evicted along
/// with their cached snapshot.
pub struct PollRegistry {
    client: reqwest::Client,
    base_url: String,
    policies: HashMap<SubjectKind, PollPolicy>,
    cache: RevalidationCache<StatusSnapshot>,
    visibility: Visibility,
    metrics: Option<PollMetricsCollector>,
    retained_finished: usize,
    sessions: RwLock<HashMap<SessionKey, SessionEntry>>,
}

impl PollRegistry {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        policies: HashMap<SubjectKind, PollPolicy>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            policies,
            cache: RevalidationCache::new(),
            visibility: Visibility::default(),
            metrics: None,
            retained_finished: DEFAULT_RETAINED_FINISHED,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: PollMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_retained_finished(mut self, retained_finished: usize) -> Self {
        self.retained_finished = retained_finished;
        self
    }

    pub fn policy(&self, kind: SubjectKind) -> PollPolicy {
        self.policies.get(&kind).cloned().unwrap_or_default()
    }

    /// Start (or restart) polling `subject`. A previous controller for the
    /// same key is dropped, which stops it.
    pub fn start(
        &self,
        kind: SubjectKind,
        subject: &str,
        options: StartOptions,
    ) -> Result<PollStatus<StatusSnapshot>, RegistryError> {
        let subject_id = SubjectId::parse(subject).ok_or(RegistryError::InvalidSubject)?;

        let mut policy = self.policy(kind);
        if let Some(interval) = options.refresh_interval_ms {
            policy.refresh_interval_ms = interval;
        }
        if let Some(max_retries) = options.max_retries {
            policy.max_retries = max_retries;
        }
        policy
            .validate()
            .map_err(|e| RegistryError::InvalidPolicy(e.to_string()))?;

        let fetcher: Arc<dyn StatusFetcher<StatusSnapshot>> = Arc::new(
            HttpStatusFetcher::new(self.client.clone(), self.base_url.clone(), kind)
                .with_token(options.token),
        );

        let completed_subject = subject_id.clone();
        let mut builder = PollController::builder(fetcher)
            .label(kind.as_str())
            .subject(subject_id.as_str())
            .policy(policy)
            .fallback(kind.pending())
            .cache(self.cache.clone())
            .visibility(self.visibility.clone())
            .on_complete(move |snapshot: &StatusSnapshot| {
                tracing::info!(
                    kind = %kind,
                    subject = %completed_subject,
                    message = %snapshot.message(),
                    "Integration reached terminal status"
                );
            });
        if let Some(metrics) = &self.metrics {
            builder = builder.metrics(metrics.clone());
        }

        // `build` already started the session when the policy polls on mount
        let controller = Arc::new(builder.build());
        if !controller.is_polling() {
            controller.start_polling();
        }
        let status = controller.status();

        let entry = SessionEntry {
            controller,
            started_at: Instant::now(),
        };
        {
            let mut sessions = self.write_sessions();
            let previous = sessions.insert((kind, subject_id.clone()), entry);
            drop(previous);
            self.prune_finished(&mut sessions, &(kind, subject_id));
        }

        Ok(status)
    }

    /// Evict the oldest finished sessions beyond `retained_finished`.
    /// `keep` is the session that was just (re)started.
    fn prune_finished(
        &self,
        sessions: &mut HashMap<SessionKey, SessionEntry>,
        keep: &SessionKey,
    ) {
        let mut finished: Vec<(SessionKey, Instant)> = sessions
            .iter()
            .filter(|(key, entry)| *key != keep && !entry.controller.is_polling())
            .map(|(key, entry)| (key.clone(), entry.started_at))
            .collect();
        if finished.len() <= self.retained_finished {
            return;
        }

        finished.sort_by_key(|(_, started_at)| *started_at);
        let excess = finished.len() - self.retained_finished;
        for (key, _) in finished.into_iter().take(excess) {
            sessions.remove(&key);
            self.cache.invalidate(&CacheKey::new(key.0.collection(), &key.1));
        }
        tracing::debug!(
            evicted = excess,
            retained = sessions.len(),
            "Pruned finished poll sessions"
        );
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<SessionKey, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<SessionKey, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn stop(
        &self,
        kind: SubjectKind,
        subject: &str,
    ) -> Option<PollStatus<StatusSnapshot>> {
        let controller = self.get(kind, subject)?;
        controller.stop_polling();
        Some(controller.status())
    }

    pub fn status(
        &self,
        kind: SubjectKind,
        subject: &str,
    ) -> Option<PollStatus<StatusSnapshot>> {
        self.get(kind, subject).map(|controller| controller.status())
    }

    pub fn get(
        &self,
        kind: SubjectKind,
        subject: &str,
    ) -> Option<Arc<PollController<StatusSnapshot>>> {
        let subject_id = SubjectId::parse(subject)?;
        self.read_sessions()
            .get(&(kind, subject_id))
            .map(|entry| entry.controller.clone())
    }

    /// Number of registered sessions that are still polling
    pub fn active_sessions(&self) -> usize {
        self.read_sessions()
            .values()
            .filter(|entry| entry.controller.is_polling())
            .count()
    }

    /// Number of sessions held, finished ones included
    pub fn session_count(&self) -> usize {
        self.read_sessions().len()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visibility.set_visible(visible);
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }
}
