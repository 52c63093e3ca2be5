// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One-shot completion signal carried by every record.
//!
//! A gate is closed when its record is dequeued from the source and opened
//! exactly once when the record's processing terminates. The Commit stage
//! waits on the gate before committing the record. Closing is only possible
//! through `&mut self`, i.e. while the record is exclusively owned by
//! Ingestion or the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug)]
pub struct CompletionGate {
    open: AtomicBool,
    notify: Notify,
}

impl CompletionGate {
    /// A gate in the open state, as records sit in the pool.
    pub fn new_open() -> Self {
        Self {
            open: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Arm the gate for a new record.
    pub fn close(&mut self) {
        *self.open.get_mut() = false;
    }

    /// Open the gate and wake the waiter.
    ///
    /// Returns `false` if the gate was already open. Opening twice means a
    /// record was acked twice, which is a bug in the caller.
    pub fn open(&self) -> bool {
        let was_open = self.open.swap(true, Ordering::AcqRel);
        debug_assert!(!was_open, "completion gate opened twice");
        if was_open {
            return false;
        }
        self.notify.notify_one();
        true
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Wait until the gate is open.
    pub async fn wait(&self) {
        // notify_one stores a permit when nobody is waiting, so an open()
        // racing with this check is never lost. A stale permit from a
        // previous use only causes one extra loop iteration.
        while !self.is_open() {
            self.notify.notified().await;
        }
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new_open()
    }
}
