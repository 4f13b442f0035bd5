//! Lock-free fixed-size pool of [`TransactionScope`]s (spec §4.8, §4.9).
//!
//! Grounded on the original's CAS-based slot pool: a rotating head index
//! picks a candidate slot, `in_use` is raced with compare-exchange, and a
//! full pool falls back to heap allocation (counted as a cache miss).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::scope::TransactionScope;

struct Slot {
    in_use: AtomicBool,
    scope: parking_lot::Mutex<TransactionScope>,
}

pub struct ScopePool {
    slots: Vec<Slot>,
    head: AtomicU64,
    cache_misses: AtomicUsize,
}

impl ScopePool {
    pub fn new(capacity: usize) -> Arc<Self> {
        let slots = (0..capacity)
            .map(|_| Slot { in_use: AtomicBool::new(false), scope: parking_lot::Mutex::new(TransactionScope::new()) })
            .collect();
        Arc::new(ScopePool { slots, head: AtomicU64::new(0), cache_misses: AtomicUsize::new(0) })
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Bumps the head modulo pool size and races to claim a slot. Falls
    /// back to a fresh heap-allocated scope if every slot is busy.
    pub fn acquire(self: &Arc<Self>) -> PooledScope {
        if !self.slots.is_empty() {
            for _ in 0..self.slots.len() {
                let idx = (self.head.fetch_add(1, Ordering::Relaxed) as usize) % self.slots.len();
                let slot = &self.slots[idx];
                if slot.in_use.compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                    slot.scope.lock().reset();
                    return PooledScope { pool: Some(self.clone()), slot_index: Some(idx), scope: None };
                }
            }
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        PooledScope { pool: None, slot_index: None, scope: Some(Box::new(TransactionScope::new())) }
    }

    fn release(&self, slot_index: usize) {
        self.slots[slot_index].in_use.store(false, Ordering::Release);
    }
}

/// RAII wrapper: releases its slot on drop. [`PooledScope::detach`] is the
/// commit handoff — it always hands back a heap-owned scope, swapping the
/// pool-backed contents out first so the slot can be reused immediately.
pub struct PooledScope {
    pool: Option<Arc<ScopePool>>,
    slot_index: Option<usize>,
    scope: Option<Box<TransactionScope>>,
}

impl PooledScope {
    pub fn with<R>(&self, f: impl FnOnce(&TransactionScope) -> R) -> R {
        match (&self.pool, self.slot_index) {
            (Some(pool), Some(idx)) => f(&pool.slots[idx].scope.lock()),
            _ => f(self.scope.as_deref().expect("heap-backed PooledScope always holds a scope")),
        }
    }

    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut TransactionScope) -> R) -> R {
        match (&self.pool, self.slot_index) {
            (Some(pool), Some(idx)) => f(&mut pool.slots[idx].scope.lock()),
            _ => f(self.scope.as_deref_mut().expect("heap-backed PooledScope always holds a scope")),
        }
    }

    /// Always returns a heap-owned scope safe to outlive the pool. If this
    /// instance is pool-backed, swaps its contents into a fresh heap scope
    /// and releases the slot immediately.
    pub fn detach(mut self) -> Box<TransactionScope> {
        if let (Some(pool), Some(idx)) = (self.pool.take(), self.slot_index.take()) {
            let mut fresh = Box::new(TransactionScope::new());
            std::mem::swap(&mut *pool.slots[idx].scope.lock(), &mut fresh);
            pool.release(idx);
            fresh
        } else {
            self.scope.take().expect("heap-backed PooledScope always holds a scope")
        }
    }
}

impl Drop for PooledScope {
    fn drop(&mut self) {
        if let (Some(pool), Some(idx)) = (self.pool.take(), self.slot_index.take()) {
            pool.release(idx);
        }
    }
}
