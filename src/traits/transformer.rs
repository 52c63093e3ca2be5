// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::OutputMessage;
use crate::errors::{CollaboratorError, CollaboratorResult};

/// Turns an extracted value into an output message.
///
/// A failed `process` terminates the record: it is acked, reported to
/// `on_error`, and committed without reaching the output.
#[async_trait]
pub trait Transformer<V, P>: Send + Sync
where
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    async fn process(&self, ctx: &CancellationToken, value: &V) -> CollaboratorResult<OutputMessage<P>>;

    async fn on_success(&self, _ctx: &CancellationToken, _value: &V) {}

    async fn on_error(&self, _ctx: &CancellationToken, _value: &V, _error: &CollaboratorError) {}
}
