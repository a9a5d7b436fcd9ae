/// Fetch-level failures of a poll tick.
///
/// Every variant is transient from the session's point of view: it is stored
/// in the session's `error` slot and the next tick is scheduled as usual.
/// `Clone` is required because coalesced fetches share one result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout")]
    Timeout,
    #[error("Remote endpoint returned status {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl PollError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::Status(code) if *code >= 500 => "http_5xx",
            Self::Status(_) => "http_4xx",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for PollError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
