// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Free-list pool for records and envelopes.
//!
//! Objects are cleared by [`Poolable::reset`] on release, so nothing
//! handed out by [`Pool::acquire`] carries state from a previous record.
//! The pool retains at most `capacity` idle objects; the rest are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An object that can be cleared and handed out again.
pub trait Poolable: Default {
    /// Clear all fields. Returns `false` if the object cannot be reused
    /// right now (e.g. it is still shared), in which case it is dropped.
    fn reset(&mut self) -> bool;
}

#[derive(Debug)]
pub struct Pool<T: Poolable> {
    free: Mutex<Vec<T>>,
    capacity: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl<T: Poolable> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Take an idle object, or allocate a fresh one.
    pub fn acquire(&self) -> T {
        let recycled = self.lock_free_list().pop();
        match recycled {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                T::default()
            }
        }
    }

    /// Clear an object and keep it for reuse if there is room.
    pub fn release(&self, mut item: T) {
        if !item.reset() {
            return;
        }
        let mut free = self.lock_free_list();
        if free.len() < self.capacity {
            free.push(item);
        }
    }

    /// Number of idle objects currently held.
    pub fn idle(&self) -> usize {
        self.lock_free_list().len()
    }

    /// Objects created because the free list was empty.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Objects served from the free list.
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    fn lock_free_list(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        // The free list holds only cleared objects, so a panic while the
        // lock was held cannot have left it inconsistent.
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
