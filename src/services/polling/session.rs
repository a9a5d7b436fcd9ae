use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::error::PollError;
use super::policy::PollPolicy;
use super::snapshot::{Snapshot, SubjectId};

/// Lifecycle of a poll session: `Idle → Polling → {Completed, Exhausted, Stopped}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Polling,
    /// A terminal snapshot was observed
    Completed,
    /// The retry ceiling was reached without a terminal snapshot
    Exhausted,
    Stopped,
}

/// Ticket for one fetch, tagged with the generation it was issued under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
    pub attempt: u32,
}

/// What the driver should do after a fetch resolved
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome<S> {
    /// Result belongs to a stopped or restarted session and was ignored
    Stale,
    /// Wait this long, then tick again
    Continue(Duration),
    /// Terminal snapshot observed; invoke the completion callback with it
    Completed(S),
    /// Retry ceiling reached
    Exhausted,
}

/// State of one poll session.
///
/// Pure state machine with no IO and no timers. The controller drives it
/// through `start`, `begin_tick`, `complete_tick` and `stop`.
#[derive(Debug, Clone)]
pub struct PollSession<S> {
    policy: PollPolicy,
    session_id: Option<Uuid>,
    subject: Option<SubjectId>,
    interval: Duration,
    retry_count: u32,
    last_snapshot: Option<S>,
    error: Option<PollError>,
    phase: SessionPhase,
    generation: u64,
    last_fetched_at: Option<DateTime<Utc>>,
}

impl<S: Snapshot> PollSession<S> {
    pub fn new(policy: PollPolicy, fallback: Option<S>) -> Self {
        Self {
            policy,
            session_id: None,
            subject: None,
            interval: Duration::ZERO,
            retry_count: 0,
            last_snapshot: fallback,
            error: None,
            phase: SessionPhase::Idle,
            generation: 0,
            last_fetched_at: None,
        }
    }

    /// Arm the session for `subject`. Returns the new generation, or `None`
    /// when the subject is empty and the session stays dormant.
    pub fn start(&mut self, subject: &str) -> Option<u64> {
        let subject = SubjectId::parse(subject)?;

        self.generation += 1;
        self.session_id = Some(Uuid::new_v4());
        self.subject = Some(subject);
        self.interval = self.policy.refresh_interval();
        self.retry_count = 0;
        self.error = None;
        self.phase = SessionPhase::Polling;

        Some(self.generation)
    }

    /// Disable polling. Returns false if the session was not polling.
    pub fn stop(&mut self) -> bool {
        if self.phase != SessionPhase::Polling {
            return false;
        }
        self.generation += 1;
        self.interval = Duration::ZERO;
        self.phase = SessionPhase::Stopped;
        true
    }

    /// Replace the fallback shown before the first response
    pub fn seed(&mut self, snapshot: S) {
        if self.last_fetched_at.is_none() {
            self.last_snapshot = Some(snapshot);
        }
    }

    /// Claim the next fetch for `generation`.
    ///
    /// Returns `None` if the generation is stale, the session is not polling,
    /// or the ceiling is already reached (the session is then retired).
    pub fn begin_tick(&mut self, generation: u64) -> Option<Tick> {
        if generation != self.generation || self.phase != SessionPhase::Polling {
            return None;
        }
        if !self.policy.should_retry(self.retry_count) {
            self.retire(SessionPhase::Exhausted);
            return None;
        }

        self.retry_count += 1;
        Some(Tick {
            generation,
            attempt: self.retry_count,
        })
    }

    /// Apply a fetch result and compute the next interval
    pub fn complete_tick(&mut self, tick: Tick, result: Result<S, PollError>) -> TickOutcome<S> {
        if tick.generation != self.generation || self.phase != SessionPhase::Polling {
            return TickOutcome::Stale;
        }

        match result {
            Ok(snapshot) => {
                self.error = None;
                self.last_fetched_at = Some(Utc::now());
                let terminal = snapshot.is_terminal();
                self.last_snapshot = Some(snapshot.clone());

                if terminal {
                    self.retire(SessionPhase::Completed);
                    return TickOutcome::Completed(snapshot);
                }
            }
            Err(e) => {
                self.error = Some(e);
            }
        }

        if !self.policy.should_retry(self.retry_count) {
            self.retire(SessionPhase::Exhausted);
            return TickOutcome::Exhausted;
        }

        self.interval = self.policy.next_interval(tick.attempt);
        TickOutcome::Continue(self.interval)
    }

    fn retire(&mut self, phase: SessionPhase) {
        self.interval = Duration::ZERO;
        self.phase = phase;
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_snapshot(&self) -> Option<&S> {
        self.last_snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&PollError> {
        self.error.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_polling(&self) -> bool {
        self.phase == SessionPhase::Polling
    }

    /// Exposed view of the session
    pub fn status(&self) -> PollStatus<S> {
        PollStatus {
            session_id: self.session_id,
            subject_id: self.subject.clone(),
            phase: self.phase,
            latest_status: self.last_snapshot.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
            is_polling: self.is_polling(),
            timed_out: self.phase == SessionPhase::Exhausted,
            completed: self.phase == SessionPhase::Completed,
            retry_count: self.retry_count,
            max_retries: self.policy.max_retries,
            interval_ms: self.interval.as_millis() as u64,
            last_fetched_at: self.last_fetched_at,
        }
    }
}

/// Reactive output of a poll session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollStatus<S> {
    pub session_id: Option<Uuid>,
    pub subject_id: Option<SubjectId>,
    pub phase: SessionPhase,
    pub latest_status: Option<S>,
    pub error: Option<String>,
    pub is_polling: bool,
    pub timed_out: bool,
    pub completed: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub interval_ms: u64,
    pub last_fetched_at: Option<DateTime<Utc>>,
}
