//! In-process coordination store - used as fallback when Redis is unavailable.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use bastion_core::domain::{FailureOutcome, LockoutPolicy, WindowDecision};
use bastion_core::ports::{GovernanceStore, StoreError};

struct Window {
    events: VecDeque<Instant>,
    length: Duration,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) >= self.length {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Default)]
struct LockoutEntry {
    failures: u32,
    /// Counter TTL, refreshed on every failure.
    failures_expire: Option<Instant>,
    locked_until: Option<Instant>,
}

impl LockoutEntry {
    fn is_locked(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    fn live_failures(&self, now: Instant) -> u32 {
        match self.failures_expire {
            Some(expire) if now < expire => self.failures,
            _ => 0,
        }
    }
}

/// In-process sliding windows and lockout entries.
///
/// Each map sits behind its own mutex, so admission checks for one key are
/// serialized with inserts into the same key. State is per-process: separate
/// instances do not see each other's counts.
pub struct InMemoryStore {
    windows: Mutex<HashMap<String, Window>>,
    lockouts: Mutex<HashMap<String, LockoutEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            lockouts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn admit(&self, key: &str, limit: u32, window: Duration) -> WindowDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert_with(|| Window {
            events: VecDeque::new(),
            length: window,
        });
        entry.length = window;
        entry.prune(now);

        let count = entry.events.len() as u32;
        if count >= limit {
            return WindowDecision {
                allowed: false,
                count,
            };
        }

        entry.events.push_back(now);
        WindowDecision {
            allowed: true,
            count: count + 1,
        }
    }

    pub async fn is_locked(&self, identifier: &str) -> bool {
        let lockouts = self.lockouts.lock().await;
        lockouts
            .get(identifier)
            .is_some_and(|entry| entry.is_locked(Instant::now()))
    }

    pub async fn record_failure(&self, identifier: &str, policy: &LockoutPolicy) -> FailureOutcome {
        let now = Instant::now();
        let mut lockouts = self.lockouts.lock().await;
        let entry = lockouts.entry(identifier.to_string()).or_default();

        entry.failures = entry.live_failures(now) + 1;
        entry.failures_expire = Some(now + policy.lockout_duration);
        if entry.failures >= policy.max_attempts {
            entry.failures = 0;
            entry.failures_expire = None;
            entry.locked_until = Some(now + policy.lockout_duration);
            return FailureOutcome::locked();
        }

        FailureOutcome::counted(entry.failures)
    }

    pub async fn clear(&self, identifier: &str) {
        self.lockouts.lock().await.remove(identifier);
    }

    /// Current failure count for an identifier.
    pub async fn failures(&self, identifier: &str) -> u32 {
        self.lockouts
            .lock()
            .await
            .get(identifier)
            .map(|entry| entry.live_failures(Instant::now()))
            .unwrap_or(0)
    }

    /// Drop windows with no live events and lockout entries with neither
    /// failures nor an active lock. Returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        {
            let mut windows = self.windows.lock().await;
            let before = windows.len();
            windows.retain(|_, window| {
                window.prune(now);
                !window.events.is_empty()
            });
            removed += before - windows.len();
        }

        let mut lockouts = self.lockouts.lock().await;
        let before = lockouts.len();
        lockouts.retain(|_, entry| entry.live_failures(now) > 0 || entry.is_locked(now));
        removed += before - lockouts.len();

        removed
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryStore {
    async fn window_admit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<WindowDecision, StoreError> {
        Ok(self.admit(key, limit, window).await)
    }

    async fn lockout_check(&self, identifier: &str) -> Result<bool, StoreError> {
        Ok(self.is_locked(identifier).await)
    }

    async fn lockout_record(
        &self,
        identifier: &str,
        policy: &LockoutPolicy,
    ) -> Result<FailureOutcome, StoreError> {
        Ok(self.record_failure(identifier, policy).await)
    }

    async fn lockout_clear(&self, identifier: &str) -> Result<(), StoreError> {
        self.clear(identifier).await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_window_admits_up_to_limit() {
        let store = InMemoryStore::new();
        let window = Duration::from_secs(60);

        for expected in 1..=3 {
            let decision = store.admit("k", 3, window).await;
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
        }

        let decision = store.admit("k", 3, window).await;
        assert!(!decision.allowed);
        assert_eq!(decision.count, 3);

        // other keys are independent
        assert!(store.admit("other", 3, window).await.allowed);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let store = InMemoryStore::new();
        let window = Duration::from_millis(100);

        assert!(store.admit("k", 1, window).await.allowed);
        assert!(!store.admit("k", 1, window).await.allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.admit("k", 1, window).await.allowed);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_exceed_limit() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(
                    async move { store.admit("hot", 10, Duration::from_secs(60)).await.allowed },
                )
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_lock_after_threshold_resets_counter() {
        let store = InMemoryStore::new();
        let policy = LockoutPolicy::default();

        for n in 1..=4 {
            let outcome = store.record_failure("a@example.com", &policy).await;
            assert_eq!(outcome, FailureOutcome::counted(n));
        }
        assert!(!store.is_locked("a@example.com").await);

        let outcome = store.record_failure("a@example.com", &policy).await;
        assert!(outcome.locked);
        assert!(store.is_locked("a@example.com").await);
        assert_eq!(store.failures("a@example.com").await, 0);
    }

    #[tokio::test]
    async fn test_lock_expires() {
        let store = InMemoryStore::new();
        let policy = LockoutPolicy {
            max_attempts: 2,
            lockout_duration: Duration::from_millis(80),
        };

        store.record_failure("id", &policy).await;
        store.record_failure("id", &policy).await;
        assert!(store.is_locked("id").await);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!store.is_locked("id").await);
    }

    #[tokio::test]
    async fn test_stale_failures_are_forgotten() {
        let store = InMemoryStore::new();
        let policy = LockoutPolicy {
            max_attempts: 3,
            lockout_duration: Duration::from_millis(60),
        };

        store.record_failure("id", &policy).await;
        store.record_failure("id", &policy).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.failures("id").await, 0);
        assert_eq!(store.record_failure("id", &policy).await, FailureOutcome::counted(1));
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_state() {
        let store = InMemoryStore::new();
        let policy = LockoutPolicy {
            max_attempts: 1,
            lockout_duration: Duration::from_millis(20),
        };

        store.admit("idle", 5, Duration::from_millis(20)).await;
        store.admit("busy", 5, Duration::from_secs(60)).await;
        store.record_failure("expired", &policy).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.sweep().await, 2);
        assert!(!store.admit("busy", 1, Duration::from_secs(60)).await.allowed);
    }
}
