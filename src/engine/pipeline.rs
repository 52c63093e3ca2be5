// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pipeline orchestrator.
//!
//! A [`Pipeline`] owns the shared limiter, the object pools and the four
//! collaborators. `start` wires the bounded queues between the five stage
//! loops and spawns them; `stop` ends intake; `wait` joins the loops.
//!
//! ```rust,no_run
//! use kq_pipeline::backends::{ChannelInput, CollectingOutput, IdentityTransformer, JsonExtractor};
//! use kq_pipeline::config::PipelineConfig;
//! use kq_pipeline::engine::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), kq_pipeline::errors::PipelineError> {
//! type Json = serde_json::Value;
//!
//! let (input, feed) = ChannelInput::<Vec<u8>>::new(64);
//! let output = std::sync::Arc::new(CollectingOutput::<Json>::new());
//!
//! let mut pipeline =
//!     Pipeline::<Vec<u8>, Json, Json>::new(PipelineConfig::default().with_max_concurrent_workers(32))?;
//! pipeline
//!     .set_input(std::sync::Arc::new(input))?
//!     .set_extractor(std::sync::Arc::new(JsonExtractor::<Json>::new()))?
//!     .set_transformer(std::sync::Arc::new(IdentityTransformer))?
//!     .set_output(output.clone())?;
//!
//! pipeline.start(CancellationToken::new())?;
//! feed.send(br#"{"id": 1}"#.to_vec()).await.ok();
//! pipeline.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::engine::limiter::Limiter;
use crate::engine::stages::{
    self, EnvelopePool, RecordPool, StageShared, COMMIT_STAGE, EXTRACT_STAGE, INGEST_STAGE, OUTPUT_STAGE,
    TRANSFORM_STAGE,
};
use crate::engine::stats::{PipelineStats, StatsSnapshot};
use crate::engine::status::{PipelineStatus, StatusCell};
use crate::engine::task::spawn_safe;
use crate::errors::PipelineError;
use crate::observability::messages::pipeline::{CollaboratorCloseFailed, PipelineStarted, PipelineStopping};
use crate::observability::messages::StructuredLog;
use crate::traits::{Extractor, Input, Output, Transformer};

/// Staged, ack-gated consume/process/commit pipeline.
///
/// `M` is the raw source message, `V` the extracted value and `P` the
/// output payload.
pub struct Pipeline<M, V, P> {
    config: PipelineConfig,
    status: Arc<StatusCell>,
    input: Option<Arc<dyn Input<M>>>,
    extractor: Option<Arc<dyn Extractor<M, V>>>,
    transformer: Option<Arc<dyn Transformer<V, P>>>,
    output: Option<Arc<dyn Output<P>>>,
    limiter: Limiter,
    stats: Arc<PipelineStats>,
    records: Arc<RecordPool<M>>,
    envelopes: Arc<EnvelopePool<M, V, P>>,
    intake: CancellationToken,
    ctx: Mutex<Option<CancellationToken>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<M, V, P> Pipeline<M, V, P>
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            status: Arc::new(StatusCell::new()),
            input: None,
            extractor: None,
            transformer: None,
            output: None,
            limiter: Limiter::new(config.max_concurrent_workers),
            stats: Arc::new(PipelineStats::default()),
            records: Arc::new(RecordPool::new(config.pool_capacity)),
            envelopes: Arc::new(EnvelopePool::new(config.pool_capacity)),
            intake: CancellationToken::new(),
            ctx: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn set_input(&mut self, input: Arc<dyn Input<M>>) -> Result<&mut Self, PipelineError> {
        self.ensure_attachable("input")?;
        self.input = Some(input);
        Ok(self)
    }

    pub fn set_extractor(&mut self, extractor: Arc<dyn Extractor<M, V>>) -> Result<&mut Self, PipelineError> {
        self.ensure_attachable("extractor")?;
        self.extractor = Some(extractor);
        Ok(self)
    }

    pub fn set_transformer(&mut self, transformer: Arc<dyn Transformer<V, P>>) -> Result<&mut Self, PipelineError> {
        self.ensure_attachable("transformer")?;
        self.transformer = Some(transformer);
        Ok(self)
    }

    pub fn set_output(&mut self, output: Arc<dyn Output<P>>) -> Result<&mut Self, PipelineError> {
        self.ensure_attachable("output")?;
        self.output = Some(output);
        Ok(self)
    }

    fn ensure_attachable(&self, collaborator: &'static str) -> Result<(), PipelineError> {
        match self.status.load() {
            PipelineStatus::Init => Ok(()),
            status => Err(PipelineError::AttachAfterStart { collaborator, status }),
        }
    }

    /// Spawn the five stage loops and return immediately.
    ///
    /// `ctx` is handed to every collaborator call. Cancelling it stops every
    /// stage without committing anything further.
    pub fn start(&self, ctx: CancellationToken) -> Result<(), PipelineError> {
        match self.status.load() {
            PipelineStatus::Running => return Err(PipelineError::AlreadyRunning),
            PipelineStatus::Closed => return Err(PipelineError::Closed),
            PipelineStatus::Init => {}
        }

        let input = self.input.clone().ok_or(PipelineError::MissingCollaborator("input"))?;
        let extractor = self
            .extractor
            .clone()
            .ok_or(PipelineError::MissingCollaborator("extractor"))?;
        let transformer = self
            .transformer
            .clone()
            .ok_or(PipelineError::MissingCollaborator("transformer"))?;
        let output = self.output.clone().ok_or(PipelineError::MissingCollaborator("output"))?;

        self.status
            .transition(PipelineStatus::Init, PipelineStatus::Running)
            .map_err(|status| match status {
                PipelineStatus::Closed => PipelineError::Closed,
                _ => PipelineError::AlreadyRunning,
            })?;

        let shared = Arc::new(StageShared {
            input,
            extractor,
            transformer,
            output,
            limiter: self.limiter.clone(),
            records: self.records.clone(),
            envelopes: self.envelopes.clone(),
            stats: self.stats.clone(),
            status: self.status.clone(),
            ctx: ctx.clone(),
            intake: self.intake.clone(),
            idle_poll_interval: self.config.idle_poll_interval(),
        });

        let (ingest_tx, ingest_rx) = mpsc::channel(self.config.ingest_queue_capacity);
        let (commit_tx, commit_rx) = mpsc::channel(self.config.commit_queue_capacity);
        let (extract_tx, extract_rx) = mpsc::channel(self.config.extract_queue_capacity);
        let (output_tx, output_rx) = mpsc::channel(self.config.output_queue_capacity);

        let handles = vec![
            spawn_safe(
                COMMIT_STAGE,
                stages::run_commit(shared.clone(), commit_rx),
            ),
            spawn_safe(
                OUTPUT_STAGE,
                stages::run_output(shared.clone(), output_rx),
            ),
            spawn_safe(
                TRANSFORM_STAGE,
                stages::run_transformation(shared.clone(), extract_rx, output_tx),
            ),
            spawn_safe(
                EXTRACT_STAGE,
                stages::run_extraction(shared.clone(), ingest_rx, extract_tx),
            ),
            spawn_safe(
                INGEST_STAGE,
                stages::run_ingestion(shared, ingest_tx, commit_tx),
            ),
        ];

        *lock(&self.ctx) = Some(ctx);
        lock(&self.handles).extend(handles);

        PipelineStarted {
            max_concurrent_workers: self.limiter.capacity(),
            ingest_queue_capacity: self.config.ingest_queue_capacity,
            commit_queue_capacity: self.config.commit_queue_capacity,
        }
        .log();

        Ok(())
    }

    /// Stop pulling new records. Records already ingested keep flowing
    /// through the downstream stages and are committed.
    pub fn stop(&self) -> Result<(), PipelineError> {
        match self.status.transition(PipelineStatus::Running, PipelineStatus::Closed) {
            Ok(()) => {}
            Err(PipelineStatus::Init) => return Err(PipelineError::NotStarted),
            Err(_) => return Ok(()),
        }

        let stats = self.stats.snapshot();
        PipelineStopping {
            ingested: stats.ingested,
            committed: stats.committed,
        }
        .log();

        self.intake.cancel();
        Ok(())
    }

    /// Join every stage loop. Returns immediately if the pipeline never started.
    pub async fn wait(&self) {
        let handles = std::mem::take(&mut *lock(&self.handles));
        for handle in handles {
            // Stage loops run under spawn_safe, so a join error means the runtime aborted them.
            let _ = handle.await;
        }
    }

    /// Stop, drain, then close the input and the output.
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        self.stop()?;
        self.wait().await;

        let ctx = lock(&self.ctx).clone().unwrap_or_default();
        if let Some(input) = &self.input {
            if let Err(error) = input.close(&ctx).await {
                CollaboratorCloseFailed {
                    collaborator: "input",
                    error: &error,
                }
                .log();
            }
        }
        if let Some(output) = &self.output {
            if let Err(error) = output.close(&ctx).await {
                CollaboratorCloseFailed {
                    collaborator: "output",
                    error: &error,
                }
                .log();
            }
        }
        Ok(())
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.load()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
