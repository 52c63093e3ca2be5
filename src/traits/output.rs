// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::OutputMessage;
use crate::errors::{CollaboratorError, CollaboratorResult};

/// Delivers output messages to the external sink.
///
/// The pipeline attempts each send once. Whether it succeeds or fails, the
/// matching callback fires and the record is acked, so a failed send does
/// not hold back commits. Retrying is the implementation's concern.
#[async_trait]
pub trait Output<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    async fn send(&self, ctx: &CancellationToken, message: &OutputMessage<P>) -> CollaboratorResult<()>;

    async fn on_success(&self, _ctx: &CancellationToken, _message: &OutputMessage<P>) {}

    async fn on_error(
        &self,
        _ctx: &CancellationToken,
        _message: &OutputMessage<P>,
        _error: &CollaboratorError,
    ) {
    }

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        Ok(())
    }
}
