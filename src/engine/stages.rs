// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The five long-lived stage loops.
//!
//! ```text
//!                ┌──> ingest queue ──> Extraction ──> extract queue ──> Transformation ──> output queue ──> Output
//! Ingestion ─────┤                          (ack on failure)                (ack on failure)                (ack always)
//!                └──> commit queue ──> Commit (waits for each record's ack, commits in arrival order)
//! ```
//!
//! Ingestion is the only stage gated on the pipeline status: once the
//! pipeline is closed it stops polling the source. Every other stage drains
//! its queue and returns when its upstream hangs up, so records already
//! pulled finish their chain and get committed. Cancelling the pipeline
//! context stops every loop at its next suspension point instead.
//!
//! Extraction, Transformation and Output spawn one worker per item, each
//! holding a permit from the shared [`Limiter`]. The worker owns the
//! record's [`PendingAck`] (directly or inside the envelope), so a
//! panicking worker still acks its record and returns its permit.
//!
//! Extraction and Transformation reserve a slot in their downstream queue
//! before taking a limiter permit, and the worker sends through that slot.
//! A worker therefore never waits on a full queue while holding a permit,
//! which would starve the stage that drains that queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio_util::sync::CancellationToken;

use crate::engine::limiter::{LimitPermit, Limiter};
use crate::engine::message::{Envelope, InputMessage, PendingAck};
use crate::engine::pool::Pool;
use crate::engine::stats::PipelineStats;
use crate::engine::status::StatusCell;
use crate::engine::task::{run_safe, spawn_safe_with_recover};
use crate::observability::messages::pipeline::{ExitReason, StageExited};
use crate::observability::messages::stage::{CommitFailed, RecordFailed, RecordStep, SourcePollFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{Extractor, Input, Output, Transformer};

pub(crate) const INGEST_STAGE: &str = "ingest";
pub(crate) const EXTRACT_STAGE: &str = "extract";
pub(crate) const TRANSFORM_STAGE: &str = "transform";
pub(crate) const OUTPUT_STAGE: &str = "output";
pub(crate) const COMMIT_STAGE: &str = "commit";

pub(crate) type RecordPool<M> = Pool<Arc<InputMessage<M>>>;
pub(crate) type EnvelopePool<M, V, P> = Pool<Box<Envelope<M, V, P>>>;
pub(crate) type EnvelopeSender<M, V, P> = mpsc::Sender<Box<Envelope<M, V, P>>>;
pub(crate) type EnvelopeReceiver<M, V, P> = mpsc::Receiver<Box<Envelope<M, V, P>>>;
type EnvelopeSlot<M, V, P> = OwnedPermit<Box<Envelope<M, V, P>>>;

/// Everything the stage loops and their workers share.
pub(crate) struct StageShared<M, V, P> {
    pub input: Arc<dyn Input<M>>,
    pub extractor: Arc<dyn Extractor<M, V>>,
    pub transformer: Arc<dyn Transformer<V, P>>,
    pub output: Arc<dyn Output<P>>,
    pub limiter: Limiter,
    pub records: Arc<RecordPool<M>>,
    pub envelopes: Arc<EnvelopePool<M, V, P>>,
    pub stats: Arc<PipelineStats>,
    pub status: Arc<StatusCell>,
    /// Hard stop for every stage.
    pub ctx: CancellationToken,
    /// Stops Ingestion from pulling further records.
    pub intake: CancellationToken,
    pub idle_poll_interval: Duration,
}

impl<M, V, P> StageShared<M, V, P>
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Sleep after an empty poll. Returns why Ingestion should exit, if it should.
    async fn idle(&self) -> Option<ExitReason> {
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Some(ExitReason::Cancelled),
            _ = self.intake.cancelled() => Some(ExitReason::Stopped),
            _ = tokio::time::sleep(self.idle_poll_interval) => None,
        }
    }

    /// Wrap a raw message in a pooled record with a closed gate.
    fn arm_record(&self, raw: M, sequence: u64) -> Arc<InputMessage<M>> {
        let mut record = self.records.acquire();
        match Arc::get_mut(&mut record) {
            Some(message) => {
                message.arm(raw, sequence);
                record
            }
            None => Arc::new(InputMessage::new(raw, sequence)),
        }
    }

    /// Wait for a permit, or for cancellation.
    async fn permit(&self) -> Result<LimitPermit, ExitReason> {
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Err(ExitReason::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| ExitReason::LimiterClosed),
        }
    }

    /// Reserve room for one envelope downstream, or learn why not.
    async fn slot(&self, tx: &EnvelopeSender<M, V, P>) -> Result<EnvelopeSlot<M, V, P>, ExitReason> {
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Err(ExitReason::Cancelled),
            slot = tx.clone().reserve_owned() => slot.map_err(|_| ExitReason::Drained),
        }
    }

    /// Log the exit of a stage loop. A hard stop also closes the limiter so
    /// any stage still parked on it wakes up.
    fn exited(&self, stage: &'static str, reason: ExitReason) {
        if matches!(reason, ExitReason::Cancelled) {
            self.limiter.close();
        }
        StageExited { stage, reason }.log();
    }

    /// Spawn a per-item worker that counts its own panic.
    fn spawn_worker<F>(&self, stage: &'static str, worker: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let stats = self.stats.clone();
        spawn_safe_with_recover(stage, worker, move |_| stats.record_worker_panic());
    }
}

/// Poll the source and fan each record out to Extraction and Commit.
pub(crate) async fn run_ingestion<M, V, P>(
    shared: Arc<StageShared<M, V, P>>,
    extract_tx: mpsc::Sender<PendingAck<M>>,
    commit_tx: mpsc::Sender<Arc<InputMessage<M>>>,
) where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let mut sequence = 0u64;

    let reason = loop {
        if !shared.status.is_running() {
            break ExitReason::Stopped;
        }

        let polled = tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            _ = shared.intake.cancelled() => break ExitReason::Stopped,
            polled = run_safe(INGEST_STAGE, shared.input.consume(&shared.ctx)) => polled,
        };

        let raw = match polled {
            Some(Ok(Some(raw))) => raw,
            Some(Ok(None)) => {
                if let Some(reason) = shared.idle().await {
                    break reason;
                }
                continue;
            }
            Some(Err(error)) => {
                shared.stats.record_poll_error();
                SourcePollFailed { error: &error }.log();
                if let Some(reason) = shared.idle().await {
                    break reason;
                }
                continue;
            }
            None => {
                shared.stats.record_worker_panic();
                if let Some(reason) = shared.idle().await {
                    break reason;
                }
                continue;
            }
        };

        sequence += 1;
        let record = shared.arm_record(raw, sequence);
        shared.stats.record_ingested();

        // Extraction first: Commit never holds a record Extraction has not been offered.
        let pending = PendingAck::new(record.clone());
        tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            sent = extract_tx.send(pending) => {
                if sent.is_err() {
                    break ExitReason::Drained;
                }
            }
        }

        tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            sent = commit_tx.send(record) => {
                if sent.is_err() {
                    break ExitReason::Drained;
                }
            }
        }
    };

    shared.exited(INGEST_STAGE, reason);
}

/// Unmarshal each record under a limiter permit.
pub(crate) async fn run_extraction<M, V, P>(
    shared: Arc<StageShared<M, V, P>>,
    mut rx: mpsc::Receiver<PendingAck<M>>,
    tx: EnvelopeSender<M, V, P>,
) where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let reason = loop {
        let pending = tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            next = rx.recv() => match next {
                Some(pending) => pending,
                None => break ExitReason::Drained,
            },
        };

        let slot = match shared.slot(&tx).await {
            Ok(slot) => slot,
            Err(reason) => break reason,
        };
        let permit = match shared.permit().await {
            Ok(permit) => permit,
            Err(reason) => break reason,
        };

        let worker_shared = shared.clone();
        shared.spawn_worker(EXTRACT_STAGE, async move {
            let _permit = permit;
            extract_record(&worker_shared, pending, slot).await;
        });
    };

    shared.exited(EXTRACT_STAGE, reason);
}

async fn extract_record<M, V, P>(
    shared: &StageShared<M, V, P>,
    pending: PendingAck<M>,
    slot: EnvelopeSlot<M, V, P>,
) where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let ctx = &shared.ctx;
    let record = pending.record().clone();

    match shared.extractor.unmarshal(ctx, &record).await {
        Ok(value) => {
            shared.extractor.on_success(ctx, &record).await;
            let mut envelope = shared.envelopes.acquire();
            envelope.load(pending, value);
            slot.send(envelope);
        }
        Err(error) => {
            pending.ack();
            shared.stats.record_extract_failure();
            RecordFailed {
                step: RecordStep::Extract,
                sequence: record.sequence(),
                error: &error,
            }
            .log();
            shared.extractor.on_error(ctx, &record, &error).await;
        }
    }
}

/// Transform each extracted value under a limiter permit.
pub(crate) async fn run_transformation<M, V, P>(
    shared: Arc<StageShared<M, V, P>>,
    mut rx: EnvelopeReceiver<M, V, P>,
    tx: EnvelopeSender<M, V, P>,
) where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let reason = loop {
        let envelope = tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            next = rx.recv() => match next {
                Some(envelope) => envelope,
                None => break ExitReason::Drained,
            },
        };

        let slot = match shared.slot(&tx).await {
            Ok(slot) => slot,
            Err(reason) => break reason,
        };
        let permit = match shared.permit().await {
            Ok(permit) => permit,
            Err(reason) => break reason,
        };

        let worker_shared = shared.clone();
        shared.spawn_worker(TRANSFORM_STAGE, async move {
            let _permit = permit;
            transform_envelope(&worker_shared, envelope, slot).await;
        });
    };

    shared.exited(TRANSFORM_STAGE, reason);
}

async fn transform_envelope<M, V, P>(
    shared: &StageShared<M, V, P>,
    mut envelope: Box<Envelope<M, V, P>>,
    slot: EnvelopeSlot<M, V, P>,
) where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let ctx = &shared.ctx;
    let Some(value) = envelope.take_extracted() else {
        shared.envelopes.release(envelope);
        return;
    };

    match shared.transformer.process(ctx, &value).await {
        Ok(output) => {
            shared.transformer.on_success(ctx, &value).await;
            drop(value);
            envelope.supersede(output);
            slot.send(envelope);
        }
        Err(error) => {
            let sequence = envelope.sequence();
            if let Some(ack) = envelope.take_ack() {
                ack.ack();
            }
            shared.stats.record_transform_failure();
            RecordFailed {
                step: RecordStep::Transform,
                sequence,
                error: &error,
            }
            .log();
            shared.transformer.on_error(ctx, &value, &error).await;
            shared.envelopes.release(envelope);
        }
    }
}

/// Send each output message under a limiter permit, then ack unconditionally.
pub(crate) async fn run_output<M, V, P>(shared: Arc<StageShared<M, V, P>>, mut rx: EnvelopeReceiver<M, V, P>)
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let reason = loop {
        let envelope = tokio::select! {
            biased;
            _ = shared.ctx.cancelled() => break ExitReason::Cancelled,
            next = rx.recv() => match next {
                Some(envelope) => envelope,
                None => break ExitReason::Drained,
            },
        };

        let permit = match shared.permit().await {
            Ok(permit) => permit,
            Err(reason) => break reason,
        };

        let worker_shared = shared.clone();
        shared.spawn_worker(OUTPUT_STAGE, async move {
            let _permit = permit;
            deliver_envelope(&worker_shared, envelope).await;
        });
    };

    shared.exited(OUTPUT_STAGE, reason);
}

async fn deliver_envelope<M, V, P>(shared: &StageShared<M, V, P>, mut envelope: Box<Envelope<M, V, P>>)
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let ctx = &shared.ctx;
    let Some(message) = envelope.take_output() else {
        shared.envelopes.release(envelope);
        return;
    };

    match shared.output.send(ctx, &message).await {
        Ok(()) => {
            shared.stats.record_output_sent();
            shared.output.on_success(ctx, &message).await;
        }
        Err(error) => {
            shared.stats.record_output_failure();
            RecordFailed {
                step: RecordStep::Output,
                sequence: envelope.sequence(),
                error: &error,
            }
            .log();
            shared.output.on_error(ctx, &message, &error).await;
        }
    }

    // Delivery ends at the attempted send; a failed send is still committed.
    if let Some(ack) = envelope.take_ack() {
        ack.ack();
    }
    shared.envelopes.release(envelope);
}

/// Commit records strictly in arrival order, each once its gate opens.
pub(crate) async fn run_commit<M, V, P>(shared: Arc<StageShared<M, V, P>>, mut rx: mpsc::Receiver<Arc<InputMessage<M>>>)
where
    M: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let ctx = &shared.ctx;

    let reason = loop {
        let record = tokio::select! {
            biased;
            _ = ctx.cancelled() => break ExitReason::Cancelled,
            next = rx.recv() => match next {
                Some(record) => record,
                None => break ExitReason::Drained,
            },
        };

        // Head-of-line: nothing behind this record is committed until it is acked.
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break ExitReason::Cancelled,
            _ = record.wait_acked() => {}
        }
        shared.stats.record_acked();

        match run_safe(COMMIT_STAGE, shared.input.commit_progress(ctx, &record)).await {
            Some(Ok(())) => shared.stats.record_committed(),
            Some(Err(error)) => {
                shared.stats.record_commit_failure();
                CommitFailed {
                    sequence: record.sequence(),
                    error: &error,
                }
                .log();
            }
            None => {
                shared.stats.record_commit_failure();
                shared.stats.record_worker_panic();
            }
        }

        shared.records.release(record);
    };

    shared.exited(COMMIT_STAGE, reason);
}
