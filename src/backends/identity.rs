// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::OutputMessage;
use crate::errors::CollaboratorResult;
use crate::traits::Transformer;

/// Emits the extracted value unchanged, with no headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

#[async_trait]
impl<V> Transformer<V, V> for IdentityTransformer
where
    V: Clone + Send + Sync + 'static,
{
    async fn process(&self, _ctx: &CancellationToken, value: &V) -> CollaboratorResult<OutputMessage<V>> {
        Ok(OutputMessage::new(value.clone()))
    }
}
