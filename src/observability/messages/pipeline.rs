// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline lifecycle and stage loop events.
//!
//! This module contains message types for logging events related to:
//! * Pipeline start and stop
//! * Stage loops exiting
//! * Collaborator shutdown

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Pipeline transitioned to `Running` and launched its stage loops.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineStarted {
    pub max_concurrent_workers: usize,
    pub ingest_queue_capacity: usize,
    pub commit_queue_capacity: usize,
}

impl Display for PipelineStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline started: max_concurrent_workers={}, ingest_queue={}, commit_queue={}",
            self.max_concurrent_workers, self.ingest_queue_capacity, self.commit_queue_capacity
        )
    }
}

impl StructuredLog for PipelineStarted {
    fn log(&self) {
        tracing::info!(
            max_concurrent_workers = self.max_concurrent_workers,
            ingest_queue_capacity = self.ingest_queue_capacity,
            commit_queue_capacity = self.commit_queue_capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline",
            span_name = name,
            max_concurrent_workers = self.max_concurrent_workers,
        )
    }
}

/// Pipeline transitioned to `Closed`; Ingestion stops pulling records.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineStopping {
    pub ingested: u64,
    pub committed: u64,
}

impl Display for PipelineStopping {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline stopping: {} records ingested, {} committed",
            self.ingested, self.committed
        )
    }
}

impl StructuredLog for PipelineStopping {
    fn log(&self) {
        tracing::info!(
            ingested = self.ingested,
            committed = self.committed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_stopping",
            span_name = name,
            ingested = self.ingested,
            committed = self.committed,
        )
    }
}

/// Why a stage loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The cancellation token fired
    Cancelled,
    /// The pipeline left `Running`
    Stopped,
    /// The upstream queue was closed and drained
    Drained,
    /// The concurrency limiter was closed
    LimiterClosed,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Cancelled => "cancelled",
            ExitReason::Stopped => "stopped",
            ExitReason::Drained => "drained",
            ExitReason::LimiterClosed => "limiter_closed",
        }
    }
}

/// A stage loop returned.
///
/// # Log Level
/// `info!` - Important operational event
pub struct StageExited<'a> {
    pub stage: &'a str,
    pub reason: ExitReason,
}

impl Display for StageExited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' exited: {}", self.stage, self.reason.as_str())
    }
}

impl StructuredLog for StageExited<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            reason = self.reason.as_str(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage_exited",
            span_name = name,
            stage = self.stage,
            reason = self.reason.as_str(),
        )
    }
}

/// A collaborator's `close` returned an error during shutdown.
///
/// # Log Level
/// `warn!` - Shutdown continues
pub struct CollaboratorCloseFailed<'a> {
    pub collaborator: &'a str,
    pub error: &'a anyhow::Error,
}

impl Display for CollaboratorCloseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to close {}: {:#}", self.collaborator, self.error)
    }
}

impl StructuredLog for CollaboratorCloseFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            collaborator = self.collaborator,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "collaborator_close_failed",
            span_name = name,
            collaborator = self.collaborator,
            error = %self.error,
        )
    }
}
