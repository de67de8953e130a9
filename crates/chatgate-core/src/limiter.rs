//! Fixed-window, per-client rate limiting.
//!
//! Every client key gets a counter in a [`ConcurrentCounterMap`]. A
//! maintenance task zeroes all counters at each window boundary and drops
//! the whole registry once per registry TTL so one-off clients do not
//! accumulate forever. The window is fixed, not sliding: a client can spend
//! a full quota right before a reset and another right after it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::counter_map::ConcurrentCounterMap;
use crate::error::{CoreError, CoreResult};

/// Length of a counting window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Requests a single client may make per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 20;
/// Interval after which every tracked client is forgotten.
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(1440 * 60);

/// Longest period either maintenance timer will use; larger policy values are clamped.
pub const MAX_TIMER_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Tunables for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
    pub registry_ttl: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
            registry_ttl: DEFAULT_REGISTRY_TTL,
        }
    }
}

/// Per-client admission control.
///
/// The limiter exclusively owns its counter registry. Requests go through
/// [`RateLimiter::check`]; the reset and clear paths are driven by the task
/// started with [`RateLimiter::spawn_maintenance`].
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    counters: ConcurrentCounterMap<String, u32>,
    window_started: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            counters: ConcurrentCounterMap::new(),
            window_started: Mutex::new(Instant::now()),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Admits or rejects one request from `client_key`.
    ///
    /// On admission returns the quota left in the current window. The
    /// read-check-increment happens under a single write lock, so the quota
    /// holds exactly even when one client sends many requests in parallel.
    pub fn check(&self, client_key: &str) -> CoreResult<u32> {
        let max = self.policy.max_requests;
        match self.counters.increment_below(client_key.to_string(), max) {
            Ok(count) => Ok(max - count),
            Err(_) => {
                let retry_after_secs = self.retry_after().as_secs();
                tracing::debug!(client = client_key, retry_after_secs, "rate limit exceeded");
                Err(CoreError::RateLimited { retry_after_secs })
            }
        }
    }

    /// Requests counted for `client_key` in the current window, `None` if untracked.
    pub fn current_count(&self, client_key: &str) -> Option<u32> {
        self.counters.get(&client_key.to_string())
    }

    /// Number of clients currently held in the registry.
    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }

    /// Time until the next window reset, rounded up to whole seconds and
    /// never below one second or above the window length.
    pub fn retry_after(&self) -> Duration {
        let window = self.policy.window;
        let elapsed = self.window_started.lock().elapsed();
        let remaining = window.saturating_sub(elapsed);
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Duration::from_secs(secs.clamp(1, window.as_secs().max(1)))
    }

    /// Zeroes every counter while keeping the keys.
    pub fn reset_window(&self) {
        *self.window_started.lock() = Instant::now();
        self.counters.set_all(0);
        tracing::debug!(clients = self.counters.len(), "reset request counters");
    }

    /// Forgets every tracked client.
    pub fn clear_registry(&self) {
        let clients = self.counters.len();
        self.counters.clear();
        tracing::info!(clients, "cleared client registry");
    }

    /// Drives the window reset and registry clear timers until `shutdown` fires.
    ///
    /// The two intervals are independent; neither tick waits on the other's
    /// handler, which only takes the registry's write lock briefly.
    pub async fn run_maintenance(&self, shutdown: CancellationToken) {
        let start = Instant::now();
        *self.window_started.lock() = start;

        let window = timer_period(self.policy.window);
        let registry_ttl = timer_period(self.policy.registry_ttl);
        let mut reset = interval_at(start + window, window);
        let mut clear = interval_at(start + registry_ttl, registry_ttl);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("rate limiter maintenance stopped");
                    break;
                }
                _ = reset.tick() => self.reset_window(),
                _ = clear.tick() => self.clear_registry(),
            }
        }
    }

    /// Spawns [`RateLimiter::run_maintenance`] on the current runtime.
    pub fn spawn_maintenance(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move { limiter.run_maintenance(shutdown).await })
    }
}

fn timer_period(period: Duration) -> Duration {
    period.clamp(Duration::from_millis(1), MAX_TIMER_PERIOD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(window_secs: u64, max: u32, ttl_secs: u64) -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(window_secs),
            max_requests: max,
            registry_ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[test]
    fn default_policy_matches_reference() {
        let p = RateLimitPolicy::default();
        assert_eq!(p.window, Duration::from_secs(60));
        assert_eq!(p.max_requests, 20);
        assert_eq!(p.registry_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn first_request_is_admitted_and_tracked() {
        let limiter = RateLimiter::new(RateLimitPolicy::default());
        assert_eq!(limiter.current_count("1.2.3.4"), None);
        assert_eq!(limiter.check("1.2.3.4").unwrap(), 19);
        assert_eq!(limiter.current_count("1.2.3.4"), Some(1));
    }

    #[test]
    fn nth_request_admitted_until_quota_then_rejected() {
        let limiter = RateLimiter::new(RateLimitPolicy::default());
        for n in 1..=20 {
            assert!(limiter.check("alice-host").is_ok(), "request {n} should pass");
        }
        match limiter.check("alice-host") {
            Err(CoreError::RateLimited { retry_after_secs }) => {
                assert!((1..=60).contains(&retry_after_secs));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn clients_are_counted_independently() {
        let limiter = RateLimiter::new(policy(60, 2, 3600));
        limiter.check("a").unwrap();
        limiter.check("a").unwrap();
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }

    #[test]
    fn reset_window_restores_full_quota() {
        let limiter = RateLimiter::new(policy(60, 3, 3600));
        for _ in 0..3 {
            limiter.check("k").unwrap();
        }
        assert!(limiter.check("k").is_err());

        limiter.reset_window();
        assert_eq!(limiter.current_count("k"), Some(0));
        assert_eq!(limiter.check("k").unwrap(), 2);
    }

    #[test]
    fn clear_registry_forgets_clients() {
        let limiter = RateLimiter::new(policy(60, 3, 3600));
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.clear_registry();
        assert_eq!(limiter.tracked_clients(), 0);
        assert_eq!(limiter.current_count("a"), None);
    }

    #[test]
    fn parallel_requests_from_one_client_respect_quota() {
        let limiter = Arc::new(RateLimiter::new(policy(60, 20, 3600)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..10).filter(|_| limiter.check("burst").is_ok()).count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_to_next_reset() {
        let limiter = RateLimiter::new(policy(60, 1, 3600));
        assert_eq!(limiter.retry_after(), Duration::from_secs(60));
        tokio::time::advance(Duration::from_millis(45_500)).await;
        assert_eq!(limiter.retry_after(), Duration::from_secs(15));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.retry_after(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_client_admitted_after_window_tick() {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::default()));
        let shutdown = CancellationToken::new();
        let task = limiter.spawn_maintenance(shutdown.clone());

        for _ in 0..20 {
            limiter.check("10.0.0.7").unwrap();
        }
        assert!(matches!(
            limiter.check("10.0.0.7"),
            Err(CoreError::RateLimited { retry_after_secs }) if retry_after_secs <= 60
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(limiter.current_count("10.0.0.7"), Some(0));
        assert!(limiter.check("10.0.0.7").is_ok());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn registry_clear_tick_drops_keys() {
        let limiter = Arc::new(RateLimiter::new(policy(10, 5, 120)));
        let shutdown = CancellationToken::new();
        let task = limiter.spawn_maintenance(shutdown.clone());

        limiter.check("gone-soon").unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        // Window resets keep the key around.
        assert_eq!(limiter.current_count("gone-soon"), Some(0));

        tokio::time::sleep(Duration::from_secs(110)).await;
        assert_eq!(limiter.current_count("gone-soon"), None);
        assert_eq!(limiter.tracked_clients(), 0);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_registry_ttl_keeps_maintenance_alive() {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy {
            window: Duration::from_secs(60),
            max_requests: 1,
            registry_ttl: Duration::from_secs(u64::MAX),
        }));
        let shutdown = CancellationToken::new();
        let task = limiter.spawn_maintenance(shutdown.clone());

        limiter.check("patient").unwrap();
        assert!(limiter.check("patient").is_err());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!task.is_finished());
        assert!(limiter.check("patient").is_ok());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[test]
    fn timer_period_is_clamped() {
        assert_eq!(timer_period(Duration::from_secs(u64::MAX)), MAX_TIMER_PERIOD);
        assert_eq!(timer_period(Duration::ZERO), Duration::from_millis(1));
        assert_eq!(timer_period(DEFAULT_WINDOW), DEFAULT_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_stops_on_shutdown() {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::default()));
        let shutdown = CancellationToken::new();
        let task = limiter.spawn_maintenance(shutdown.clone());
        shutdown.cancel();
        task.await.unwrap();

        limiter.check("x").unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(limiter.current_count("x"), Some(1));
    }
}
