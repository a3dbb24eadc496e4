// ==========================================
// KandyPack Ledger - Keyed lock registry
// ==========================================
// Mutual exclusion per schedule / per order leg with a bounded wait.
// A caller takes all of its keys at once or none of them, so two callers
// can never hold one key each and wait on the other.
// ==========================================

use crate::domain::types::AllocationType;
use crate::engine::error::{AllocationError, AllocationResult};
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub fn schedule_key(schedule_id: &str) -> String {
    format!("schedule:{}", schedule_id)
}

pub fn order_leg_key(order_id: &str, allocation_type: AllocationType) -> String {
    format!("order:{}:{}", order_id, allocation_type.to_db_str())
}

#[derive(Default)]
pub struct KeyedLockRegistry {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Releases its keys on drop
pub struct KeyedLockGuard<'a> {
    registry: &'a KeyedLockRegistry,
    keys: Vec<String>,
}

impl KeyedLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in `keys`, waiting at most `timeout`
    ///
    /// # Errors
    /// `Busy` naming the first key still held when the wait runs out
    pub fn acquire_all(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> AllocationResult<KeyedLockGuard<'_>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let started = Instant::now();
        let deadline = started + timeout;

        // The set only holds plain strings; a panic elsewhere cannot leave it half-updated.
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let blocking = keys.iter().find(|k| held.contains(k.as_str())).cloned();
            match blocking {
                None => {
                    for key in &keys {
                        held.insert(key.clone());
                    }
                    tracing::trace!(keys = ?keys, "locks acquired");
                    return Ok(KeyedLockGuard {
                        registry: self,
                        keys,
                    });
                }
                Some(key) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited_ms = started.elapsed().as_millis() as u64;
                        tracing::warn!(key = %key, waited_ms, "lock wait timed out");
                        return Err(AllocationError::Busy { key, waited_ms });
                    }
                    let (guard, _) = self
                        .released
                        .wait_timeout(held, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    held = guard;
                }
            }
        }
    }

    pub fn acquire(&self, key: &str, timeout: Duration) -> AllocationResult<KeyedLockGuard<'_>> {
        self.acquire_all(&[key.to_string()], timeout)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

impl KeyedLockGuard<'_> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .registry
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.registry.released.notify_all();
    }
}
