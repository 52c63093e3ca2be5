// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::InputMessage;
use crate::errors::{CollaboratorError, CollaboratorResult};

/// Decodes a raw record into the value the transformer works on.
///
/// A failed `unmarshal` terminates the record: it is acked, reported to
/// `on_error`, and committed without reaching the transformer.
#[async_trait]
pub trait Extractor<M, V>: Send + Sync
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn unmarshal(&self, ctx: &CancellationToken, message: &InputMessage<M>)
        -> CollaboratorResult<V>;

    async fn on_success(&self, _ctx: &CancellationToken, _message: &InputMessage<M>) {}

    async fn on_error(
        &self,
        _ctx: &CancellationToken,
        _message: &InputMessage<M>,
        _error: &CollaboratorError,
    ) {
    }
}
