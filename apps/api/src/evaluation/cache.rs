//! Evaluation Cache — memoizes generation calls keyed by the exact prompt text.
//!
//! Bounded LRU of successful evaluations plus an in-flight table with one
//! `OnceCell` per prompt being computed. Concurrent callers of the same prompt
//! share the cell, so `compute` runs once and every caller gets its result.
//! Different prompts never wait on each other: the state mutex is only held
//! for map lookups, never across `compute`.
//!
//! Failures are handed to the callers that were already waiting and then
//! dropped; only successes are retained. A computation whose callers are all
//! cancelled gives up its in-flight slot.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::evaluation::models::EvaluationResult;
use crate::evaluation::prompts::EvaluationPrompt;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;

type InFlight = Arc<OnceCell<EvaluationResult>>;

struct CacheState {
    entries: LruCache<String, EvaluationResult>,
    in_flight: HashMap<String, InFlight>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Holds a caller's share of an in-flight computation.
struct InFlightGuard<'a> {
    cache: &'a EvaluationCache,
    key: &'a str,
    cell: InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.cache.release(self.key, &self.cell);
    }
}

pub struct EvaluationCache {
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvaluationCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the stored result for `prompt`, or runs `compute` once and returns that.
    pub async fn get_or_compute<F, Fut>(
        &self,
        prompt: &EvaluationPrompt,
        compute: F,
    ) -> EvaluationResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EvaluationResult>,
    {
        let cell = {
            let mut state = self.lock();
            if let Some(hit) = state.entries.get(&prompt.text) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Evaluation cache hit ({} prompt chars)", prompt.text.len());
                return hit.clone();
            }
            let cell = state.in_flight.entry(prompt.text.clone()).or_default();
            Arc::clone(cell)
        };

        // Dropped on every exit path, including when the caller's future is cancelled.
        let guard = InFlightGuard {
            cache: self,
            key: &prompt.text,
            cell,
        };

        let result = guard
            .cell
            .get_or_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Evaluation cache miss, computing");
                compute().await
            })
            .await
            .clone();

        drop(guard);
        result
    }

    /// Moves a computation out of the in-flight table once its caller lets go of it.
    ///
    /// A finished cell is settled by the first caller to get here: a success goes into
    /// the LRU, a failure is dropped. An unfinished cell means the caller was cancelled;
    /// its slot is removed only when no other caller is still waiting on it, so the next
    /// request for that prompt starts a fresh computation.
    fn release(&self, key: &str, cell: &InFlight) {
        let mut state = self.lock();
        let owned = state
            .in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell));
        if !owned {
            return;
        }
        match cell.get() {
            Some(result) => {
                // Insert before removing so a concurrent lookup always sees one of the two.
                if result.is_success() {
                    state.entries.put(key.to_string(), result.clone());
                } else {
                    debug!("Not caching failed evaluation: {:?}", result.error_kind());
                }
                state.in_flight.remove(key);
            }
            // Clones are only taken under this lock: the table and `cell` are the last two holders.
            None if Arc::strong_count(cell) == 2 => {
                debug!("Evaluation abandoned before completion, releasing its slot");
                state.in_flight.remove(key);
            }
            None => {}
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
            in_flight: state.in_flight.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Map operations cannot leave the state half-updated, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
