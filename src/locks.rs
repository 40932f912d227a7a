//! Per-domain in-flight locks.
//!
//! Only one scrape or enrichment runs per domain at a time. Locks carry an
//! expiry so a crashed worker cannot wedge a domain forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Registry of in-flight domains.
#[derive(Debug, Clone)]
pub struct DomainLocks {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl DomainLocks {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Attempts to take the lock for a domain. Returns a guard that
    /// releases on drop, or `None` when another worker holds a live lock.
    pub fn try_acquire(&self, domain: &str) -> Option<DomainLockGuard> {
        let mut map = self.inner.lock().expect("domain lock mutex poisoned");
        let now = Instant::now();
        if let Some(acquired_at) = map.get(domain) {
            if now.duration_since(*acquired_at) < self.ttl {
                return None;
            }
            tracing::warn!("Expired domain lock reclaimed for {}", domain);
        }
        map.insert(domain.to_string(), now);
        Some(DomainLockGuard {
            locks: self.clone(),
            domain: domain.to_string(),
        })
    }

    fn release(&self, domain: &str) {
        let mut map = self.inner.lock().expect("domain lock mutex poisoned");
        map.remove(domain);
    }
}

/// RAII guard for one domain's lock.
pub struct DomainLockGuard {
    locks: DomainLocks,
    domain: String,
}

impl Drop for DomainLockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_blocked_while_held() {
        let locks = DomainLocks::new(Duration::from_secs(60));
        let guard = locks.try_acquire("acme.com").unwrap();
        assert!(locks.try_acquire("acme.com").is_none());
        drop(guard);
        assert!(locks.try_acquire("acme.com").is_some());
    }

    #[test]
    fn different_domains_are_independent() {
        let locks = DomainLocks::new(Duration::from_secs(60));
        let _a = locks.try_acquire("acme.com").unwrap();
        assert!(locks.try_acquire("globex.com").is_some());
    }

    #[test]
    fn expired_lock_is_reclaimed() {
        let locks = DomainLocks::new(Duration::from_millis(10));
        let guard = locks.try_acquire("acme.com").unwrap();
        // Simulate a crashed worker: never drop the guard.
        std::mem::forget(guard);
        std::thread::sleep(Duration::from_millis(20));
        assert!(locks.try_acquire("acme.com").is_some());
    }
}
