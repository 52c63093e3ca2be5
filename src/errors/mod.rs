// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod pipeline;

pub use config::ConfigError;
pub use pipeline::PipelineError;

/// Error type returned by collaborator operations.
pub type CollaboratorError = anyhow::Error;

/// Result type returned by collaborator operations.
pub type CollaboratorResult<T> = anyhow::Result<T>;
