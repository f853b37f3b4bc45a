// src/youtube/quota.rs
// =============================================================================
// The credential pool: a set of API keys, each with its own daily quota.
//
// How it works:
// 1. Before a request, the client asks for a Lease covering the request cost
// 2. The pool walks the credentials starting at the one currently in use and
//    reserves the cost on the first Active key with enough quota left
// 3. If the API then says "quota exceeded", the key is marked Exhausted and
//    the client asks for another lease
// 4. The composition root calls reset_all() when the quota day rolls over;
//    the pool itself never looks at the clock
//
// The pool is the only shared mutable state in a scan, so all counters are
// atomics. Reserving before use means quota_used can never pass quota_limit,
// even when several requests race for the same key.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// One API key and its quota accounting.
#[derive(Debug)]
pub struct Credential {
    id: String,
    key: String,
    quota_limit: u64,
    quota_used: AtomicU64,
    exhausted: AtomicBool,
}

impl Credential {
    pub fn new(id: impl Into<String>, key: impl Into<String>, quota_limit: u64) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            quota_limit,
            quota_used: AtomicU64::new(0),
            exhausted: AtomicBool::new(false),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    // Atomically adds `cost` to quota_used if it still fits under the limit.
    fn try_reserve(&self, cost: u64) -> bool {
        if self.is_exhausted() {
            return false;
        }

        let limit = self.quota_limit;
        self.quota_used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(cost).filter(|next| *next <= limit)
            })
            .is_ok()
    }

    fn release(&self, cost: u64) {
        // Saturating so a stray release after reset_all() can't wrap around
        let _ = self
            .quota_used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(cost))
            });
    }

    fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::Release);
    }

    fn reset(&self) {
        self.quota_used.store(0, Ordering::Release);
        self.exhausted.store(false, Ordering::Release);
    }

    fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            id: self.id.clone(),
            quota_used: self.quota_used.load(Ordering::Acquire),
            quota_limit: self.quota_limit,
            exhausted: self.is_exhausted(),
        }
    }
}

/// Point-in-time view of one credential, safe to log or serialize
/// (it never carries the key itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSnapshot {
    pub id: String,
    pub quota_used: u64,
    pub quota_limit: u64,
    pub exhausted: bool,
}

/// A reservation of `cost` quota units on one credential.
#[derive(Debug, Clone)]
pub struct Lease {
    index: usize,
    cost: u64,
    credential_id: String,
    key: String,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }
}

/// The pool of credentials shared by every request in a scan.
///
/// Owned by the composition root (main) and handed to the API client in an
/// `Arc`, so several clients or scans can share one set of counters.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    // Index of the credential we last succeeded with. Rotation starts here.
    current: AtomicUsize,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials,
            current: AtomicUsize::new(0),
        }
    }

    /// Builds a pool from raw keys, naming them key-1, key-2, ...
    pub fn from_keys<I, S>(keys: I, quota_limit: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| Credential::new(format!("key-{}", i + 1), key, quota_limit))
            .collect();
        Self::new(credentials)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Reserves `cost` units on the first Active credential that can afford
    /// it, starting from the one currently in use.
    ///
    /// Credentials that are Active but can't cover the cost are flipped to
    /// Exhausted on the way past. Returns None when nothing is left.
    pub fn acquire(&self, cost: u64) -> Option<Lease> {
        let count = self.credentials.len();
        if count == 0 {
            return None;
        }

        let start = self.current.load(Ordering::Acquire) % count;
        for offset in 0..count {
            let index = (start + offset) % count;
            let credential = &self.credentials[index];

            if credential.is_exhausted() {
                continue;
            }

            if credential.try_reserve(cost) {
                if index != start {
                    tracing::debug!(credential = %credential.id, "rotated to next API credential");
                }
                self.current.store(index, Ordering::Release);
                return Some(Lease {
                    index,
                    cost,
                    credential_id: credential.id.clone(),
                    key: credential.key.clone(),
                });
            }

            tracing::info!(credential = %credential.id, "credential cannot cover request cost, marking exhausted");
            credential.mark_exhausted();
        }

        None
    }

    /// Gives back a reservation for a request the API never billed
    /// (it failed before reaching the server).
    pub fn release(&self, lease: &Lease) {
        if let Some(credential) = self.credentials.get(lease.index) {
            credential.release(lease.cost);
        }
    }

    /// Marks the leased credential Exhausted after a quota-exceeded signal.
    pub fn mark_exhausted(&self, lease: &Lease) {
        if let Some(credential) = self.credentials.get(lease.index) {
            tracing::warn!(credential = %credential.id, "API reported quota exceeded");
            credential.mark_exhausted();
        }
    }

    /// Scheduled rollover: every credential goes back to Active with zero
    /// usage. The caller owns the schedule.
    pub fn reset_all(&self) {
        for credential in &self.credentials {
            credential.reset();
        }
        self.current.store(0, Ordering::Release);
    }

    pub fn snapshot(&self) -> Vec<CredentialSnapshot> {
        self.credentials.iter().map(Credential::snapshot).collect()
    }

    pub fn all_exhausted(&self) -> bool {
        self.credentials.iter().all(Credential::is_exhausted)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why atomics instead of a Mutex?
//    - Each counter is a single number, so an atomic is enough
//    - fetch_update retries a compare-and-swap until it wins, which makes
//      "check the limit, then add" one indivisible step
//    - No lock means no poisoning to handle
//
// 2. What is Ordering::AcqRel?
//    - It makes writes done before the update visible to whoever reads the
//      counter afterwards
//    - Acquire on loads pairs with Release on stores
//
// 3. Why does Lease carry a copy of the key?
//    - The caller needs the key for the duration of the request
//    - Cloning a short String is simpler than borrowing from the pool across
//      an .await
// -----------------------------------------------------------------------------
