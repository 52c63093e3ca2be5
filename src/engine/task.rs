// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Panic-safe task spawning.
//!
//! Every stage loop and every per-record worker runs through this module.
//! A panic inside the future is caught, logged with its message and a
//! backtrace, and turned into a normal return. Resources owned by the
//! future (limiter permits, pending acks) are dropped while the panic
//! unwinds, so their cleanup runs on the fault path exactly as it does on
//! the normal path.

use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

use crate::observability::messages::{stage::TaskPanicked, StructuredLog};

/// Diagnostic for a recovered panic.
#[derive(Debug)]
pub struct TaskPanic {
    pub task: &'static str,
    pub message: String,
    pub backtrace: Backtrace,
}

impl TaskPanic {
    fn from_payload(task: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            task,
            message,
            // Captured at the recovery point, which for async tasks is the
            // poll that unwound.
            backtrace: Backtrace::force_capture(),
        }
    }

    fn log(&self) {
        TaskPanicked {
            task: self.task,
            message: &self.message,
            backtrace: &self.backtrace,
        }
        .log();
    }
}

/// Run `fut` to completion, converting a panic into `None`.
pub async fn run_safe<F>(task: &'static str, fut: F) -> Option<F::Output>
where
    F: Future,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(output) => Some(output),
        Err(payload) => {
            TaskPanic::from_payload(task, payload).log();
            None
        }
    }
}

/// Spawn `fut` on the runtime; a panic is logged instead of propagated.
pub fn spawn_safe<F>(task: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    spawn_safe_with_recover(task, fut, |_| {})
}

/// Like [`spawn_safe`], additionally running `on_panic` after a panic was
/// recovered and logged.
pub fn spawn_safe_with_recover<F, R>(task: &'static str, fut: F, on_panic: R) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
    R: FnOnce(&TaskPanic) + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
            let panic = TaskPanic::from_payload(task, payload);
            panic.log();
            on_panic(&panic);
        }
    })
}
