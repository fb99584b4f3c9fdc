//! Quota tracking for the code-hosting platform.
//!
//! GitHub meters search, GraphQL and core REST calls in separate pools, so each pool keeps
//! its own remaining count and reset instant. State is fed from response headers via
//! `observe` and consulted before every call via `reserve`/`acquire`. All updates take the
//! same lock, so there is exactly one writer at a time.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::settings::RateLimitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Allowed,
    MustWait(Duration),
}

/// Independently metered rate-limit pool, as named by `x-ratelimit-resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaPool {
    Search,
    Graphql,
    Core,
}

impl QuotaPool {
    pub fn from_resource(resource: &str) -> Option<Self> {
        match resource.trim().to_ascii_lowercase().as_str() {
            "search" => Some(QuotaPool::Search),
            "graphql" => Some(QuotaPool::Graphql),
            "core" => Some(QuotaPool::Core),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuotaPool::Search => "search",
            QuotaPool::Graphql => "graphql",
            QuotaPool::Core => "core",
        }
    }

    fn index(self) -> usize {
        match self {
            QuotaPool::Search => 0,
            QuotaPool::Graphql => 1,
            QuotaPool::Core => 2,
        }
    }
}

#[derive(Debug, Default)]
struct QuotaState {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
}

pub struct RateLimiter {
    pools: Mutex<[QuotaState; 3]>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            pools: Mutex::new(Default::default()),
            settings,
        }
    }

    /// The search pool is far smaller (30/min) than the others, so it has its own floor.
    fn floor(&self, pool: QuotaPool) -> u32 {
        match pool {
            QuotaPool::Search => self.settings.search_quota_floor,
            QuotaPool::Graphql | QuotaPool::Core => self.settings.quota_floor,
        }
    }

    /// Claims one call against the pool's known quota.
    ///
    /// Below the floor, calls are refused until the reset instant has passed. Unknown
    /// quota (no response observed yet) is always allowed.
    pub fn reserve(&self, pool: QuotaPool) -> Reservation {
        let floor = self.floor(pool);
        let mut pools = self.lock();
        let state = &mut pools[pool.index()];
        let now = Instant::now();

        if let (Some(remaining), Some(reset_at)) = (state.remaining, state.reset_at) {
            if remaining < floor && reset_at > now {
                return Reservation::MustWait(reset_at - now);
            }
            if reset_at <= now && remaining < floor {
                // Window rolled over; quota is unknown until the next response.
                state.remaining = None;
                state.reset_at = None;
                return Reservation::Allowed;
            }
        }

        if let Some(remaining) = state.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Reservation::Allowed
    }

    /// Non-consuming check used by callers that prefer to stop instead of waiting.
    pub fn pressure(&self, pool: QuotaPool) -> Option<Duration> {
        let floor = self.floor(pool);
        let pools = self.lock();
        let state = &pools[pool.index()];
        let now = Instant::now();
        match (state.remaining, state.reset_at) {
            (Some(remaining), Some(reset_at)) if remaining < floor && reset_at > now => {
                Some(reset_at - now)
            }
            _ => None,
        }
    }

    /// Degraded-mode callers stop issuing calls against `pool` while this holds.
    pub fn is_halted(&self, pool: QuotaPool) -> bool {
        self.pressure(pool).is_some()
    }

    /// Records the quota reported by the latest response from `pool`.
    pub fn observe(&self, pool: QuotaPool, remaining: u32, reset_in: Duration) {
        let mut pools = self.lock();
        let state = &mut pools[pool.index()];
        state.remaining = Some(remaining);
        state.reset_at = Some(Instant::now() + reset_in);
        debug!(
            pool = pool.label(),
            remaining,
            reset_in_secs = reset_in.as_secs(),
            "Quota observed"
        );
    }

    /// Waits until a call against `pool` may be issued.
    pub async fn acquire(&self, pool: QuotaPool) {
        loop {
            match self.reserve(pool) {
                Reservation::Allowed => return,
                Reservation::MustWait(wait) => {
                    warn!(
                        "Quota for {} below floor ({}), waiting {}s for reset",
                        pool.label(),
                        self.floor(pool),
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub fn remaining(&self, pool: QuotaPool) -> Option<u32> {
        self.lock()[pool.index()].remaining
    }

    /// Lowest known remaining count across `pools`.
    pub fn lowest_remaining(&self, pools: &[QuotaPool]) -> Option<u32> {
        let state = self.lock();
        pools
            .iter()
            .filter_map(|pool| state[pool.index()].remaining)
            .min()
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base … capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay_ms = self
            .settings
            .backoff_base_ms
            .saturating_mul(1 << exponent)
            .min(self.settings.backoff_cap_ms);
        Duration::from_millis(delay_ms)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [QuotaState; 3]> {
        // A poisoned lock only means a panic elsewhere; the counters are still usable.
        self.pools.lock().unwrap_or_else(|e| e.into_inner())
    }
}
