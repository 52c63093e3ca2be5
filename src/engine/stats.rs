// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the stage loops and workers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    ingested: AtomicU64,
    acked: AtomicU64,
    committed: AtomicU64,
    commit_failures: AtomicU64,
    extract_failures: AtomicU64,
    transform_failures: AtomicU64,
    output_sent: AtomicU64,
    output_failures: AtomicU64,
    poll_errors: AtomicU64,
    worker_panics: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ingested: u64,
    pub acked: u64,
    pub committed: u64,
    pub commit_failures: u64,
    pub extract_failures: u64,
    pub transform_failures: u64,
    pub output_sent: u64,
    pub output_failures: u64,
    pub poll_errors: u64,
    pub worker_panics: u64,
}

impl StatsSnapshot {
    /// Records ingested whose processing has not terminated yet.
    pub fn in_flight(&self) -> u64 {
        self.ingested.saturating_sub(self.acked)
    }
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter! {
    record_ingested => ingested,
    record_acked => acked,
    record_committed => committed,
    record_commit_failure => commit_failures,
    record_extract_failure => extract_failures,
    record_transform_failure => transform_failures,
    record_output_sent => output_sent,
    record_output_failure => output_failures,
    record_poll_error => poll_errors,
    record_worker_panic => worker_panics,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ingested: self.ingested.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            extract_failures: self.extract_failures.load(Ordering::Relaxed),
            transform_failures: self.transform_failures.load(Ordering::Relaxed),
            output_sent: self.output_sent.load(Ordering::Relaxed),
            output_failures: self.output_failures.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
        }
    }
}
