use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;

/// per-minute request allowance for anonymous callers
pub const ANONYMOUS_LIMIT: u32 = 60;
/// per-minute request allowance for authenticated callers
pub const AUTHENTICATED_LIMIT: u32 = 120;

pub fn limit_for(authenticated: bool) -> u32 {
    if authenticated {
        AUTHENTICATED_LIMIT
    } else {
        ANONYMOUS_LIMIT
    }
}

/// outcome of a rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: i64 },
}

/// fixed-window request counter keyed by caller identifier.
///
/// The only in-process mutable state kept across requests besides the
/// domain stores; intended for the presentation layer, not the engine.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    counters: HashMap<String, (DateTime<Utc>, u32)>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            window: Duration::seconds(60),
            counters: HashMap::new(),
        }
    }

    /// count one request against the identifier's current window
    pub fn check(
        &mut self,
        identifier: &str,
        limit: u32,
        time_provider: &SafeTimeProvider,
    ) -> RateDecision {
        let now = time_provider.now();
        let entry = self
            .counters
            .entry(identifier.to_string())
            .or_insert((now, 0));

        if now - entry.0 >= self.window {
            *entry = (now, 0);
        }

        if entry.1 >= limit {
            let retry_after = (entry.0 + self.window - now).num_seconds().max(0);
            return RateDecision::Limited {
                retry_after_secs: retry_after,
            };
        }

        entry.1 += 1;
        RateDecision::Allowed {
            remaining: limit - entry.1,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
