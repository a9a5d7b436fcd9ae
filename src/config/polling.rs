use std::collections::HashMap;
use validator::Validate;

use super::environment::{parse_or, ConfigError};
use crate::services::polling::{Backoff, PollPolicy, SubjectKind};

/// Default poll policy per integration flow
pub fn default_policy(kind: SubjectKind) -> PollPolicy {
    match kind {
        // DNS changes propagate slowly: every 10s for up to 10 minutes,
        // started as soon as the domain settings page mounts
        SubjectKind::Domain => PollPolicy::new(10_000, 60).with_poll_on_mount(true),
        // Verification usually lands within a few minutes of adding the tag
        SubjectKind::SearchConsole => PollPolicy::new(10_000, 30),
        // The user is sitting in the OAuth popup: poll quickly, give up after ~5 minutes
        SubjectKind::OAuth => PollPolicy::new(3_000, 100),
    }
}

/// Load poll policies, applying `<KIND>_POLL_INTERVAL_MS`,
/// `<KIND>_POLL_MAX_RETRIES`, `<KIND>_POLL_ON_MOUNT` and
/// `<KIND>_POLL_MAX_INTERVAL_MS` (switches to exponential backoff) overrides.
pub fn load_poll_policies<F>(lookup: &F) -> Result<HashMap<SubjectKind, PollPolicy>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut policies = HashMap::new();

    for kind in SubjectKind::ALL {
        let prefix = kind.env_prefix();
        let defaults = default_policy(kind);

        let mut policy = PollPolicy {
            refresh_interval_ms: parse_or(
                lookup,
                &format!("{}_POLL_INTERVAL_MS", prefix),
                defaults.refresh_interval_ms,
            )?,
            max_retries: parse_or(
                lookup,
                &format!("{}_POLL_MAX_RETRIES", prefix),
                defaults.max_retries,
            )?,
            poll_on_mount: parse_or(
                lookup,
                &format!("{}_POLL_ON_MOUNT", prefix),
                defaults.poll_on_mount,
            )?,
            backoff: defaults.backoff,
        };

        let max_interval_key = format!("{}_POLL_MAX_INTERVAL_MS", prefix);
        if lookup(&max_interval_key).is_some() {
            let max_interval_ms: u64 = parse_or(lookup, &max_interval_key, 0)?;
            policy.backoff = Backoff::Exponential {
                max_interval_ms,
                jitter_factor: parse_or(lookup, &format!("{}_POLL_JITTER", prefix), 0.1)?,
            };
        }

        policy.validate()?;
        policies.insert(kind, policy);
    }

    Ok(policies)
}
