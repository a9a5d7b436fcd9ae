pub mod cache;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod policy;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod visibility;

pub use cache::{CacheKey, RevalidationCache};
pub use controller::{CompletionCallback, PollController, PollControllerBuilder};
pub use error::PollError;
pub use fetcher::{HttpStatusFetcher, StatusFetcher};
pub use policy::{Backoff, PollPolicy};
pub use registry::{PollRegistry, RegistryError, StartOptions, DEFAULT_RETAINED_FINISHED};
pub use session::{PollSession, PollStatus, SessionPhase, Tick, TickOutcome};
pub use snapshot::{
    DomainStatus, OAuthStatus, Snapshot, StatusSnapshot, SubjectId, SubjectKind,
    VerificationStatus,
};
pub use visibility::Visibility;
