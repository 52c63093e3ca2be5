// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a pipeline. Moves forward only: `Init -> Running -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineStatus {
    Init = 1,
    Running = 2,
    Closed = 3,
}

impl PipelineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineStatus::Init,
            2 => PipelineStatus::Running,
            _ => PipelineStatus::Closed,
        }
    }
}

/// Atomically readable and writable [`PipelineStatus`].
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PipelineStatus::Init as u8))
    }

    pub(crate) fn load(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.load() == PipelineStatus::Running
    }

    /// Move from `from` to `to`. On failure returns the actual current status.
    pub(crate) fn transition(&self, from: PipelineStatus, to: PipelineStatus) -> Result<(), PipelineStatus> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PipelineStatus::from_u8)
    }
}
