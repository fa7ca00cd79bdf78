//! Provider Health State
//!
//! Shared cooldown map for the fallback manager: a provider that signals
//! quota or rate exhaustion is marked unavailable and skipped by every
//! in-flight request until its cooldown lapses.
//!
//! Expiry is lazy - checked when the provider is next considered, never via
//! a background timer. The clock is injectable so cooldown behavior is
//! testable without sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

/// Time source for cooldown bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time, the production clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Per-provider availability, shared across concurrent requests.
///
/// Marking is idempotent: a burst of failures from concurrent requests pins
/// the first failure's timestamp, it does not extend the window.
pub struct ProviderHealth {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    unavailable_since: DashMap<String, Instant>,
}

impl ProviderHealth {
    pub fn new(cooldown: Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown,
            clock,
            unavailable_since: DashMap::new(),
        }
    }

    /// Put a provider on cooldown. No-op if it is already marked.
    pub fn mark_unavailable(&self, provider: &str) {
        let now = self.clock.now();
        let newly_marked = !self.unavailable_since.contains_key(provider);
        self.unavailable_since
            .entry(provider.to_string())
            .or_insert(now);
        if newly_marked {
            info!(
                provider = %provider,
                cooldown_secs = self.cooldown.as_secs(),
                "Provider marked unavailable"
            );
        }
    }

    /// Whether the provider may be tried. A lapsed cooldown is cleared here.
    pub fn is_available(&self, provider: &str) -> bool {
        let Some(entry) = self.unavailable_since.get(provider) else {
            return true;
        };
        let since = *entry.value();
        drop(entry);

        if self.clock.now().duration_since(since) >= self.cooldown {
            self.unavailable_since.remove(provider);
            debug!(provider = %provider, "Provider cooldown lapsed, eligible again");
            true
        } else {
            false
        }
    }

    /// Remaining cooldown, if the provider is currently marked
    pub fn cooldown_remaining(&self, provider: &str) -> Option<Duration> {
        let entry = self.unavailable_since.get(provider)?;
        let elapsed = self.clock.now().duration_since(*entry.value());
        self.cooldown.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Clear all cooldowns (manual intervention)
    pub fn reset(&self) {
        self.unavailable_since.clear();
    }
}
