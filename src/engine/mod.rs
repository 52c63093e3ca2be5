// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod gate;
pub mod limiter;
pub mod message;
pub mod pipeline;
pub mod pool;
mod stages;
pub mod stats;
pub mod status;
pub mod task;

pub use gate::CompletionGate;
pub use limiter::{LimitPermit, Limiter};
pub use message::{Envelope, InputMessage, OutputMessage, PendingAck};
pub use pipeline::Pipeline;
pub use pool::{Pool, Poolable};
pub use stats::{PipelineStats, StatsSnapshot};
pub use status::PipelineStatus;
pub use task::{run_safe, spawn_safe, spawn_safe_with_recover, TaskPanic};
