//! Fixed-window rate limiting for auth flows.
//!
//! Counters are keyed by `OPERATION:identifier`. The first request in a window
//! creates an entry with `count = 1`; later requests in the same window bump
//! the count. Once `now > reset_time` the entry is replaced, never incremented.
//!
//! Storage sits behind [`RateLimitStore`] so a shared store with TTL support can
//! replace the in-process map for multi-instance deployments.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

pub const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationType {
    Registration,
    Login,
    Logout,
    PasswordReset,
}

impl OperationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "REGISTRATION",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::PasswordReset => "PASSWORD_RESET",
        }
    }

    #[must_use]
    pub const fn policy(self) -> RateLimitPolicy {
        match self {
            Self::Registration => RateLimitPolicy::per_hour(5),
            Self::Login => RateLimitPolicy::per_hour(10),
            Self::Logout => RateLimitPolicy::per_hour(30),
            Self::PasswordReset => RateLimitPolicy::per_hour(3),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window_ms: i64,
}

impl RateLimitPolicy {
    const fn per_hour(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            window_ms: 60 * 60 * 1000,
        }
    }

    fn window(self) -> Duration {
        Duration::milliseconds(self.window_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time
    }
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub is_limited: bool,
    pub limit: u32,
    pub remaining_attempts: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Whole seconds until the window resets, never less than one.
    #[must_use]
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_time - now).num_milliseconds();
        ((millis + 999) / 1000).max(1)
    }
}

pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> Option<RateLimitEntry>;
    fn set(&self, key: &str, entry: RateLimitEntry);
    fn delete(&self, key: &str);

    /// Remove every entry whose window has passed; returns how many were removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Count one attempt for `key` and return the resulting entry.
    ///
    /// The default composes `get`/`set` and is only safe for single-writer
    /// stores; implementations shared across threads should override it with
    /// an atomic read-modify-write.
    fn record_attempt(&self, key: &str, now: DateTime<Utc>, window: Duration) -> RateLimitEntry {
        let entry = next_entry(self.get(key), now, window);
        self.set(key, entry);
        entry
    }
}

fn next_entry(
    current: Option<RateLimitEntry>,
    now: DateTime<Utc>,
    window: Duration,
) -> RateLimitEntry {
    match current {
        Some(entry) if !entry.is_expired(now) => RateLimitEntry {
            count: entry.count.saturating_add(1),
            reset_time: entry.reset_time,
        },
        _ => RateLimitEntry {
            count: 1,
            reset_time: now + window,
        },
    }
}

/// Process-local store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // A panic while holding the lock cannot leave a counter half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries().get(key).copied()
    }

    fn set(&self, key: &str, entry: RateLimitEntry) {
        self.entries().insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn record_attempt(&self, key: &str, now: DateTime<Utc>, window: Duration) -> RateLimitEntry {
        let mut entries = self.entries();
        let entry = next_entry(entries.get(key).copied(), now, window);
        entries.insert(key.to_string(), entry);
        entry
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()))
    }

    #[must_use]
    pub fn key(operation: OperationType, identifier: &str) -> String {
        format!("{}:{identifier}", operation.as_str())
    }

    /// Count an attempt for `identifier` against the operation's policy.
    #[must_use]
    pub fn check(&self, operation: OperationType, identifier: &str) -> RateLimitStatus {
        self.check_at(operation, identifier, Utc::now())
    }

    #[must_use]
    pub fn check_at(
        &self,
        operation: OperationType,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let policy = operation.policy();
        let key = Self::key(operation, identifier);
        let entry = self.store.record_attempt(&key, now, policy.window());

        RateLimitStatus {
            is_limited: entry.count > policy.max_attempts,
            limit: policy.max_attempts,
            remaining_attempts: policy.max_attempts.saturating_sub(entry.count),
            reset_time: entry.reset_time,
        }
    }

    pub fn sweep(&self) -> usize {
        self.store.sweep(Utc::now())
    }
}

/// Periodically drop expired windows so the store stays bounded.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            debug!(removed, "rate limit sweep finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn first_request_opens_window() {
        let limiter = RateLimiter::in_memory();
        let status = limiter.check_at(OperationType::Registration, "10.0.0.1", t0());
        assert!(!status.is_limited);
        assert_eq!(status.remaining_attempts, 4);
        assert_eq!(status.reset_time, t0() + Duration::hours(1));
    }

    #[test]
    fn limit_trips_after_max_attempts_for_every_operation() {
        for operation in [
            OperationType::Registration,
            OperationType::Login,
            OperationType::Logout,
            OperationType::PasswordReset,
        ] {
            let limiter = RateLimiter::in_memory();
            let max = operation.policy().max_attempts;
            for attempt in 1..=max {
                let status = limiter.check_at(operation, "client", t0());
                assert!(!status.is_limited, "{operation:?} attempt {attempt}");
                assert_eq!(status.remaining_attempts, max - attempt);
            }
            let status = limiter.check_at(operation, "client", t0());
            assert!(status.is_limited, "{operation:?} should be limited");
            assert_eq!(status.remaining_attempts, 0);
        }
    }

    #[test]
    fn expired_window_resets_count() {
        let limiter = RateLimiter::in_memory();
        for _ in 0..20 {
            let _ = limiter.check_at(OperationType::Login, "client", t0());
        }
        let later = t0() + Duration::hours(1) + Duration::milliseconds(1);
        let status = limiter.check_at(OperationType::Login, "client", later);
        assert!(!status.is_limited);
        assert_eq!(status.remaining_attempts, 9);
        assert_eq!(status.reset_time, later + Duration::hours(1));
    }

    #[test]
    fn boundary_instant_still_counts_in_window() {
        let limiter = RateLimiter::in_memory();
        let _ = limiter.check_at(OperationType::PasswordReset, "client", t0());
        let status =
            limiter.check_at(OperationType::PasswordReset, "client", t0() + Duration::hours(1));
        assert_eq!(status.remaining_attempts, 1);
        assert_eq!(status.reset_time, t0() + Duration::hours(1));
    }

    #[test]
    fn operations_and_identifiers_are_isolated() {
        let limiter = RateLimiter::in_memory();
        for _ in 0..6 {
            let _ = limiter.check_at(OperationType::Registration, "a", t0());
        }
        assert!(limiter.check_at(OperationType::Registration, "a", t0()).is_limited);
        assert!(!limiter.check_at(OperationType::Registration, "b", t0()).is_limited);
        assert!(!limiter.check_at(OperationType::Login, "a", t0()).is_limited);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::new(store.clone());
        let _ = limiter.check_at(OperationType::Login, "old", t0());
        let _ = limiter.check_at(OperationType::Login, "new", t0() + Duration::minutes(59));
        assert_eq!(store.len(), 2);

        let removed = store.sweep(t0() + Duration::hours(1) + Duration::seconds(1));
        assert_eq!(removed, 1);
        assert!(store.get(&RateLimiter::key(OperationType::Login, "old")).is_none());
        assert!(store.get(&RateLimiter::key(OperationType::Login, "new")).is_some());
    }

    #[test]
    fn store_get_set_delete() {
        let store = InMemoryRateLimitStore::new();
        let entry = RateLimitEntry {
            count: 3,
            reset_time: t0(),
        };
        store.set("LOGIN:x", entry);
        assert_eq!(store.get("LOGIN:x"), Some(entry));
        store.delete("LOGIN:x");
        assert!(store.is_empty());
    }

    #[test]
    fn retry_after_rounds_up() {
        let status = RateLimitStatus {
            is_limited: true,
            limit: 5,
            remaining_attempts: 0,
            reset_time: t0() + Duration::milliseconds(1500),
        };
        assert_eq!(status.retry_after_seconds(t0()), 2);
        assert_eq!(status.retry_after_seconds(t0() + Duration::hours(2)), 1);
    }

    #[test]
    fn concurrent_checks_never_lose_increments() {
        let limiter = Arc::new(RateLimiter::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let _ = limiter.check_at(OperationType::Login, "shared", t0());
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        let status = limiter.check_at(OperationType::Login, "shared", t0());
        assert!(status.is_limited);
        let key = RateLimiter::key(OperationType::Login, "shared");
        assert_eq!(limiter.store.get(&key).map(|e| e.count), Some(201));
    }
}
