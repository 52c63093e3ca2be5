// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;       // ready-made collaborators
pub mod config;         // pipeline tuning + loading
pub mod engine;         // stages, limiter, gates, pools
pub mod errors;         // error handling
pub mod observability;
pub mod traits;         // collaborator contracts
