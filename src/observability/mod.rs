// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic the pipeline emits is a message type under
//! [`messages`] with a `Display` implementation and a
//! [`StructuredLog`](messages::StructuredLog) implementation that attaches
//! the message's fields to the tracing event. This keeps log text out of the
//! stage loops and gives every event a consistent set of fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::pipeline` - Orchestrator lifecycle and stage loop events
//! * `messages::stage` - Per-record failures and worker faults
//!
//! # Usage
//!
//! ```rust
//! use kq_pipeline::observability::messages::{stage::CommitFailed, StructuredLog};
//!
//! let error = anyhow::anyhow!("broker unavailable");
//! CommitFailed {
//!     sequence: 42,
//!     error: &error,
//! }
//! .log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// `default_directive` is used when `RUST_LOG` is unset or invalid, e.g.
/// `"kq_pipeline=info"`. Returns `false` if a global subscriber was already
/// installed, which makes repeated calls (tests, embedding applications)
/// harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
