// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::InputMessage;
use crate::errors::CollaboratorResult;

/// Source of records, and the sink for consumption progress.
#[async_trait]
pub trait Input<M>: Send + Sync
where
    M: Send + Sync + 'static,
{
    /// Poll for the next raw message.
    ///
    /// `Ok(None)` means nothing is available yet; errors are logged and the
    /// poll is retried. Neither stops the pipeline.
    async fn consume(&self, ctx: &CancellationToken) -> CollaboratorResult<Option<M>>;

    /// Record that `message` and everything before it has been processed.
    ///
    /// Called exactly once per record, in the order records were consumed.
    async fn commit_progress(
        &self,
        ctx: &CancellationToken,
        message: &InputMessage<M>,
    ) -> CollaboratorResult<()>;

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        Ok(())
    }
}
