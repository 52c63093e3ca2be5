// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

use crate::engine::InputMessage;
use crate::errors::CollaboratorResult;
use crate::traits::Extractor;

/// Deserializes a byte payload as JSON into `V`.
///
/// Works for any raw message type that exposes its bytes (`Vec<u8>`,
/// `String`, `bytes`-like wrappers).
#[derive(Debug)]
pub struct JsonExtractor<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonExtractor<V> {
    pub fn new() -> Self {
        Self { _value: PhantomData }
    }
}

impl<V> Default for JsonExtractor<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M, V> Extractor<M, V> for JsonExtractor<V>
where
    M: AsRef<[u8]> + Send + Sync + 'static,
    V: DeserializeOwned + Send + Sync + 'static,
{
    async fn unmarshal(&self, _ctx: &CancellationToken, message: &InputMessage<M>) -> CollaboratorResult<V> {
        let raw = message
            .raw()
            .ok_or_else(|| anyhow!("record #{} has no payload", message.sequence()))?;

        serde_json::from_slice(raw.as_ref())
            .with_context(|| format!("record #{} is not valid JSON", message.sequence()))
    }
}
