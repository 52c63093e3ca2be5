// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Counting limiter bounding the number of in-flight stage workers.
//!
//! One [`Limiter`] is shared by the Extraction, Transformation and Output
//! stages. A stage acquires a [`LimitPermit`] before it spawns a worker and
//! moves the permit into the worker, so the permit is returned on every
//! exit path: normal completion, early return, or a recovered panic.
//!
//! Releasing is tied to ownership of the permit. `release` consumes the
//! permit, so releasing more often than acquiring cannot be expressed.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::errors::PipelineError;

/// Fixed-capacity admission control shared across stages.
#[derive(Debug, Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Limiter {
    /// Create a limiter handing out at most `capacity` permits (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a permit is free.
    ///
    /// Waiters are served in FIFO order. Fails only if the limiter was
    /// closed.
    pub async fn acquire(&self) -> Result<LimitPermit, PipelineError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::LimiterClosed)?;
        Ok(self.wrap(permit))
    }

    /// Take a permit if one is free right now.
    pub fn try_acquire(&self) -> Option<LimitPermit> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(self.wrap(permit)),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Number of permits currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of permits currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wake every waiter with an error and refuse further acquisitions.
    pub fn close(&self) {
        self.semaphore.close();
    }

    fn wrap(&self, permit: OwnedSemaphorePermit) -> LimitPermit {
        LimitPermit {
            permit: Some(permit),
            semaphore: self.semaphore.clone(),
            capacity: self.capacity,
        }
    }
}

/// One unit of limiter capacity. Returned to the limiter when released or dropped.
#[derive(Debug)]
pub struct LimitPermit {
    permit: Option<OwnedSemaphorePermit>,
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl LimitPermit {
    /// Return the permit to the limiter.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(permit) = self.permit.take() {
            drop(permit);
            debug_assert!(
                self.semaphore.available_permits() <= self.capacity,
                "limiter over-released: {} permits available, capacity {}",
                self.semaphore.available_permits(),
                self.capacity
            );
        }
    }
}

impl Drop for LimitPermit {
    fn drop(&mut self) {
        self.give_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn try_acquire_respects_capacity() {
        let limiter = Limiter::new(2);

        let first = limiter.try_acquire();
        let second = limiter.try_acquire();
        let third = limiter.try_acquire();

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
        assert_eq!(limiter.available_permits(), 0);
        assert_eq!(limiter.in_use(), 2);

        first.unwrap().release();
        assert_eq!(limiter.available_permits(), 1);
        drop(second);
        assert_eq!(limiter.available_permits(), 2);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let limiter = Limiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let limiter = Limiter::new(1);
        let held = limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        held.release();
        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken by release")
            .unwrap();
        assert!(acquired.is_ok());
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test]
    async fn close_fails_pending_acquire() {
        let limiter = Limiter::new(1);
        let _held = limiter.acquire().await.unwrap();
        limiter.close();

        assert!(matches!(
            limiter.acquire().await,
            Err(PipelineError::LimiterClosed)
        ));
        assert!(limiter.try_acquire().is_none());
    }

    #[tokio::test]
    async fn permit_is_released_when_task_panics() {
        let limiter = Limiter::new(1);
        let permit = limiter.acquire().await.unwrap();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            panic!("worker failed");
        });
        assert!(handle.await.is_err());

        assert_eq!(limiter.available_permits(), 1);
    }
}
