// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready-made collaborators.
//!
//! # Available Backends
//!
//! ## Memory
//! - **ChannelInput**: feeds the pipeline from a bounded tokio channel and
//!   records every committed sequence number
//! - **CollectingOutput**: keeps every delivered [`OutputMessage`](crate::engine::OutputMessage)
//! - **Use Case**: embedding, demos, tests
//!
//! ## JSON
//! - **JsonExtractor**: deserializes raw bytes into any `serde` type
//!
//! ## Identity
//! - **IdentityTransformer**: passes the extracted value through as the payload
//!
//! ## Stub Backend (Test-Only)
//! Instrumented collaborators for engine tests: configurable delays,
//! failures and panics, plus a concurrency probe. NOT available in
//! production builds.

pub mod identity;
pub mod json;
pub mod memory;
#[cfg(test)]
pub mod stub;

pub use identity::IdentityTransformer;
pub use json::JsonExtractor;
pub use memory::{ChannelInput, CollectingOutput};
