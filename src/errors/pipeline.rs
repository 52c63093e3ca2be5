// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for pipeline construction and lifecycle control.

use thiserror::Error;

use crate::engine::PipelineStatus;
use crate::errors::ConfigError;

/// Errors returned by the pipeline's control surface.
///
/// Operational failures of individual records never surface here; they are
/// reported through the collaborator callbacks and the log.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `start` was called without every collaborator attached
    #[error("Cannot start pipeline: no {0} attached")]
    MissingCollaborator(&'static str),

    /// `start` was called on a pipeline that is already running
    #[error("Pipeline is already running")]
    AlreadyRunning,

    /// `start` was called on a pipeline that has been stopped
    #[error("Pipeline is closed and cannot be restarted")]
    Closed,

    /// `stop` was called before `start`
    #[error("Pipeline has not been started")]
    NotStarted,

    /// A collaborator setter was called after the pipeline left `Init`
    #[error("Cannot attach {collaborator} while pipeline is {status:?}")]
    AttachAfterStart {
        collaborator: &'static str,
        status: PipelineStatus,
    },

    /// The concurrency limiter was closed while a stage was waiting on it
    #[error("Concurrency limiter closed")]
    LimiterClosed,
}
