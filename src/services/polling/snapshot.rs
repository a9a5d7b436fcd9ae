use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A status snapshot returned by a remote poll endpoint.
///
/// `is_terminal` is the termination predicate: a pure function of the
/// snapshot. Once it returns true the owning session is retired and never
/// asks again.
pub trait Snapshot: Clone + Send + Sync + 'static {
    fn is_terminal(&self) -> bool;
    fn message(&self) -> &str;
}

/// Opaque identifier of the resource being polled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Returns `None` for empty or whitespace-only input, which keeps a
    /// session dormant. `.` and `..` are rejected too: they cannot travel as
    /// a single path segment of the poll URL.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" | "." | ".." => None,
            trimmed => Some(Self(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three integration flows that poll a remote status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectKind {
    /// Custom-domain DNS configuration of a website
    Domain,
    /// Google Search Console site verification
    SearchConsole,
    /// Instagram OAuth completion
    #[serde(rename = "oauth")]
    OAuth,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 3] = [Self::Domain, Self::SearchConsole, Self::OAuth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::SearchConsole => "search-console",
            Self::OAuth => "oauth",
        }
    }

    /// Path segment of the remote resource collection
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Domain => "websites",
            Self::SearchConsole => "integrations",
            Self::OAuth => "oauth",
        }
    }

    /// Prefix of the environment variables carrying this kind's poll policy
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Domain => "DOMAIN",
            Self::SearchConsole => "SEARCH_CONSOLE",
            Self::OAuth => "OAUTH",
        }
    }

    /// Decode a raw endpoint response into the snapshot variant for this kind
    pub fn decode(&self, body: Value) -> Result<StatusSnapshot, serde_json::Error> {
        Ok(match self {
            Self::Domain => StatusSnapshot::Domain(serde_json::from_value(body)?),
            Self::SearchConsole => StatusSnapshot::SearchConsole(serde_json::from_value(body)?),
            Self::OAuth => StatusSnapshot::OAuth(serde_json::from_value(body)?),
        })
    }

    /// Neutral "not yet configured" snapshot shown before the first response
    pub fn pending(&self) -> StatusSnapshot {
        match self {
            Self::Domain => StatusSnapshot::Domain(DomainStatus {
                misconfigured: true,
                message: PENDING_MESSAGE.to_string(),
                details: Map::new(),
            }),
            Self::SearchConsole => StatusSnapshot::SearchConsole(VerificationStatus {
                verified: false,
                message: PENDING_MESSAGE.to_string(),
                details: Map::new(),
            }),
            Self::OAuth => StatusSnapshot::OAuth(OAuthStatus {
                authenticated: false,
                message: PENDING_MESSAGE.to_string(),
                details: Map::new(),
            }),
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(Self::Domain),
            "search-console" => Ok(Self::SearchConsole),
            "oauth" => Ok(Self::OAuth),
            other => Err(format!("Unknown poll kind: {}", other)),
        }
    }
}

const PENDING_MESSAGE: &str = "pending";

// =============================================================================
// SNAPSHOT VARIANTS
// =============================================================================

/// Domain DNS configuration state. Terminal once the domain is no longer misconfigured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStatus {
    pub misconfigured: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Search Console verification state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub verified: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// OAuth completion state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Snapshot for DomainStatus {
    fn is_terminal(&self) -> bool {
        !self.misconfigured
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl Snapshot for VerificationStatus {
    fn is_terminal(&self) -> bool {
        self.verified
    }

    fn message(&self) -> &str {
        &self.message
    }
}

impl Snapshot for OAuthStatus {
    fn is_terminal(&self) -> bool {
        self.authenticated
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Snapshot of any subject kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StatusSnapshot {
    Domain(DomainStatus),
    SearchConsole(VerificationStatus),
    #[serde(rename = "oauth")]
    OAuth(OAuthStatus),
}

impl StatusSnapshot {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::Domain(_) => SubjectKind::Domain,
            Self::SearchConsole(_) => SubjectKind::SearchConsole,
            Self::OAuth(_) => SubjectKind::OAuth,
        }
    }
}

impl Snapshot for StatusSnapshot {
    fn is_terminal(&self) -> bool {
        match self {
            Self::Domain(s) => s.is_terminal(),
            Self::SearchConsole(s) => s.is_terminal(),
            Self::OAuth(s) => s.is_terminal(),
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Domain(s) => s.message(),
            Self::SearchConsole(s) => s.message(),
            Self::OAuth(s) => s.message(),
        }
    }
}
