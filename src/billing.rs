//! Credit/billing gate.
//!
//! The orchestrator checks the gate before every paid provider call and
//! treats a `false` as "stop the waterfall now". The gate is authoritative;
//! the per-lead call budget is a secondary cap enforced separately.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Capability check consulted before each paid provider call.
pub trait CreditGate: Send + Sync {
    /// Whether the account can afford `count` units of `action`.
    fn can_afford(&self, action: &str, count: u32) -> bool;

    /// Deducts `count` units of `action`. A repeated call with the same
    /// `idempotency_key` must not deduct twice. Returns false when the
    /// balance is insufficient.
    fn spend(&self, action: &str, count: u32, idempotency_key: &str) -> bool;
}

impl<G: CreditGate + ?Sized> CreditGate for Arc<G> {
    fn can_afford(&self, action: &str, count: u32) -> bool {
        (**self).can_afford(action, count)
    }

    fn spend(&self, action: &str, count: u32, idempotency_key: &str) -> bool {
        (**self).spend(action, count, idempotency_key)
    }
}

/// Deterministic idempotency key for one provider attempt on one lead.
pub fn spend_key(lead_id: Uuid, provider: &str, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(lead_id.as_bytes());
    hasher.update(provider.as_bytes());
    hasher.update(attempt.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Gate that always allows. For plans with unmetered enrichment.
#[derive(Debug, Default)]
pub struct UnmeteredGate;

impl CreditGate for UnmeteredGate {
    fn can_afford(&self, _action: &str, _count: u32) -> bool {
        true
    }

    fn spend(&self, _action: &str, _count: u32, _idempotency_key: &str) -> bool {
        true
    }
}

/// In-memory credit ledger with idempotent spends. Backs tests and
/// single-process glue; a persisted ledger implements the same trait.
#[derive(Debug)]
pub struct LedgerGate {
    balance: AtomicI64,
    seen_keys: Mutex<HashSet<String>>,
}

impl LedgerGate {
    pub fn new(balance: i64) -> Self {
        Self {
            balance: AtomicI64::new(balance),
            seen_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Remaining balance.
    pub fn remaining(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }
}

impl CreditGate for LedgerGate {
    fn can_afford(&self, _action: &str, count: u32) -> bool {
        self.balance.load(Ordering::SeqCst) >= count as i64
    }

    fn spend(&self, action: &str, count: u32, idempotency_key: &str) -> bool {
        {
            let mut seen = self.seen_keys.lock().expect("ledger mutex poisoned");
            if !seen.insert(idempotency_key.to_string()) {
                // Already charged for this attempt.
                return true;
            }
        }
        let result = self
            .balance
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                if b >= count as i64 {
                    Some(b - count as i64)
                } else {
                    None
                }
            });
        match result {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("Credit gate refused spend of {} for {}", count, action);
                // Roll the key back so a topped-up account can retry.
                self.seen_keys
                    .lock()
                    .expect("ledger mutex poisoned")
                    .remove(idempotency_key);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_is_idempotent_per_key() {
        let gate = LedgerGate::new(10);
        let key = spend_key(Uuid::new_v4(), "apollo", 0);
        assert!(gate.spend("enrich", 3, &key));
        assert!(gate.spend("enrich", 3, &key));
        assert_eq!(gate.remaining(), 7);
    }

    #[test]
    fn spend_refuses_over_balance() {
        let gate = LedgerGate::new(2);
        assert!(!gate.spend("enrich", 3, "k1"));
        assert_eq!(gate.remaining(), 2);
        assert!(gate.spend("enrich", 2, "k2"));
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn keys_differ_per_attempt_and_provider() {
        let lead = Uuid::new_v4();
        assert_ne!(spend_key(lead, "apollo", 0), spend_key(lead, "apollo", 1));
        assert_ne!(spend_key(lead, "apollo", 0), spend_key(lead, "hunter", 0));
    }
}
