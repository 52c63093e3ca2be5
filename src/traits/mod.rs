// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Collaborator contracts plugged into a [`Pipeline`](crate::engine::Pipeline).
//!
//! The pipeline owns none of the transport, decoding or delivery logic; it
//! drives four externally supplied collaborators:
//!
//! ```text
//! Input ──consume──> Extractor ──unmarshal──> Transformer ──process──> Output ──send
//!   ^                                                                        │
//!   └───────────────── commit_progress (in arrival order) <──── ack ─────────┘
//! ```
//!
//! Every operation receives the pipeline's [`CancellationToken`](tokio_util::sync::CancellationToken)
//! as its context. Implementations that block for long should observe it;
//! the pipeline never aborts an in-flight collaborator call.

pub mod extractor;
pub mod input;
pub mod output;
pub mod transformer;

pub use extractor::Extractor;
pub use input::Input;
pub use output::Output;
pub use transformer::Transformer;
