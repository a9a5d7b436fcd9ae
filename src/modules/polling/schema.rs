use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::polling::{PollStatus, StartOptions, StatusSnapshot, SubjectKind};

// =============================================================================
// START
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartPollRequest {
    /// OAuth session token forwarded as `?token=`
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    #[validate(range(
        min = 100,
        max = 3_600_000,
        message = "refresh_interval_ms must be between 100 and 3600000"
    ))]
    pub refresh_interval_ms: Option<u64>,
    #[serde(default)]
    #[validate(range(min = 1, max = 1_000, message = "max_retries must be between 1 and 1000"))]
    pub max_retries: Option<u32>,
}

impl From<StartPollRequest> for StartOptions {
    fn from(req: StartPollRequest) -> Self {
        Self {
            token: req.token,
            refresh_interval_ms: req.refresh_interval_ms,
            max_retries: req.max_retries,
        }
    }
}

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PollStatusResponse {
    pub kind: SubjectKind,
    #[serde(flatten)]
    pub status: PollStatus<StatusSnapshot>,
}

// =============================================================================
// VISIBILITY
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub visible: bool,
    pub active_sessions: usize,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
