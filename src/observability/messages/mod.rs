// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human readable line and
//! [`StructuredLog`] to emit it at its documented level with structured
//! fields attached.
//!
//! # Organization
//!
//! * `pipeline` - Orchestrator lifecycle and stage loop events
//! * `stage` - Per-record failures and worker faults
//!
//! # Usage Pattern
//!
//! ```rust
//! use kq_pipeline::observability::messages::{pipeline::PipelineStarted, StructuredLog};
//!
//! let msg = PipelineStarted {
//!     max_concurrent_workers: 64,
//!     ingest_queue_capacity: 1000,
//!     commit_queue_capacity: 1000,
//! };
//!
//! msg.log();
//! ```

pub mod pipeline;
pub mod stage;

use tracing::Span;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
