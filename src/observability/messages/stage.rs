// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-record failures and worker faults.
//!
//! Records are identified by their arrival `sequence`, which is also the
//! order in which the Commit stage commits them.

use crate::observability::messages::StructuredLog;
use std::backtrace::Backtrace;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The source returned an error from `consume`. Retried on the next poll.
///
/// # Log Level
/// `debug!` - Expected to be transient and potentially frequent
pub struct SourcePollFailed<'a> {
    pub error: &'a anyhow::Error,
}

impl Display for SourcePollFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Source poll failed, retrying: {:#}", self.error)
    }
}

impl StructuredLog for SourcePollFailed<'_> {
    fn log(&self) {
        tracing::debug!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("source_poll_failed", span_name = name, error = %self.error)
    }
}

/// Which collaborator step rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStep {
    Extract,
    Transform,
    Output,
}

impl RecordStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStep::Extract => "extract",
            RecordStep::Transform => "transform",
            RecordStep::Output => "output",
        }
    }
}

/// A collaborator step failed for a record. The record is acked and will
/// still be committed.
///
/// # Log Level
/// `warn!` - Record-level failure, reported to the collaborator callback as well
pub struct RecordFailed<'a> {
    pub step: RecordStep,
    pub sequence: u64,
    pub error: &'a anyhow::Error,
}

impl Display for RecordFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Record #{} failed at {}: {:#}",
            self.sequence,
            self.step.as_str(),
            self.error
        )
    }
}

impl StructuredLog for RecordFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            step = self.step.as_str(),
            sequence = self.sequence,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "record_failed",
            span_name = name,
            step = self.step.as_str(),
            sequence = self.sequence,
        )
    }
}

/// The source rejected a progress commit. The Commit stage moves on.
///
/// # Log Level
/// `warn!` - Progress for this record may be re-delivered
pub struct CommitFailed<'a> {
    pub sequence: u64,
    pub error: &'a anyhow::Error,
}

impl Display for CommitFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Commit of record #{} failed: {:#}", self.sequence, self.error)
    }
}

impl StructuredLog for CommitFailed<'_> {
    fn log(&self) {
        tracing::warn!(sequence = self.sequence, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("commit_failed", span_name = name, sequence = self.sequence)
    }
}

/// A record's pending ack was dropped without being acked explicitly.
///
/// Happens when a worker panics, or when a queue holding the record is
/// dropped during shutdown. The gate is opened from the drop.
///
/// # Log Level
/// `debug!` - Expected during shutdown; a panic is logged separately
pub struct AckedOnDrop {
    pub sequence: u64,
}

impl Display for AckedOnDrop {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Record #{} acked on drop", self.sequence)
    }
}

impl StructuredLog for AckedOnDrop {
    fn log(&self) {
        tracing::debug!(sequence = self.sequence, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("acked_on_drop", span_name = name, sequence = self.sequence)
    }
}

/// A spawned task panicked and was recovered.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct TaskPanicked<'a> {
    pub task: &'a str,
    pub message: &'a str,
    pub backtrace: &'a Backtrace,
}

impl Display for TaskPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' panicked: {}", self.task, self.message)
    }
}

impl StructuredLog for TaskPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            task = self.task,
            panic = self.message,
            backtrace = %self.backtrace,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "task_panicked",
            span_name = name,
            task = self.task,
            panic = self.message,
        )
    }
}
