// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Instrumented collaborators for engine tests.
//!
//! Records carry `u32` values equal to their sequence number, so a test can
//! target a specific record with a failure, a panic or a delay.

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::backends::IdentityTransformer;
use crate::config::PipelineConfig;
use crate::engine::{InputMessage, OutputMessage, Pipeline};
use crate::errors::{CollaboratorError, CollaboratorResult};
use crate::traits::{Extractor, Input, Output, Transformer};

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Tracks how many instrumented calls are running at once.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(self.clone())
    }
}

struct ProbeGuard(Arc<ConcurrencyProbe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-record behaviour shared by the stub extractor, transformer and output.
#[derive(Debug, Default, Clone)]
pub struct Behavior {
    max_delay_ms: u64,
    failing: HashSet<u32>,
    panicking: HashSet<u32>,
    probe: Option<Arc<ConcurrencyProbe>>,
    hold: Option<Arc<Semaphore>>,
}

impl Behavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay each call by a deterministic pseudo-random amount below `max_ms`.
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.max_delay_ms = max_ms;
        self
    }

    pub fn failing(mut self, value: u32) -> Self {
        self.failing.insert(value);
        self
    }

    pub fn panicking(mut self, value: u32) -> Self {
        self.panicking.insert(value);
        self
    }

    pub fn probed(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Block each call until a permit is added to `hold`.
    pub fn held(mut self, hold: Arc<Semaphore>) -> Self {
        self.hold = Some(hold);
        self
    }

    async fn apply(&self, value: u32) -> CollaboratorResult<()> {
        if let Some(hold) = &self.hold {
            hold.acquire().await?.forget();
        }
        let _guard = self.probe.as_ref().map(|probe| probe.enter());

        if self.max_delay_ms > 0 {
            // Later records often finish first, which is what ordering tests need.
            let delay = (u64::from(value).wrapping_mul(2_654_435_761) >> 7) % self.max_delay_ms;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.panicking.contains(&value) {
            panic!("stub panic on record {value}");
        }
        if self.failing.contains(&value) {
            return Err(anyhow!("stub failure on record {value}"));
        }
        Ok(())
    }
}

/// Callback counters.
#[derive(Debug, Default)]
pub struct Callbacks {
    successes: AtomicUsize,
    errors: AtomicUsize,
}

impl Callbacks {
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    fn success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Emits `1..=total`, then reports nothing available.
#[derive(Debug, Default)]
pub struct StubInput {
    total: u32,
    next: AtomicU32,
    failing_polls: AtomicU32,
    failing_commits: HashSet<u64>,
    committed: Mutex<Vec<u64>>,
    closed: std::sync::atomic::AtomicBool,
}

impl StubInput {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fail the first `count` polls.
    pub fn with_failing_polls(self, count: u32) -> Self {
        self.failing_polls.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_failing_commit(mut self, sequence: u64) -> Self {
        self.failing_commits.insert(sequence);
        self
    }

    /// Every `commit_progress` call, failed or not, in call order.
    pub fn committed(&self) -> Vec<u64> {
        self.committed.lock().unwrap().clone()
    }

    pub fn consumed(&self) -> u32 {
        self.next.load(Ordering::SeqCst).min(self.total)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Input<u32> for StubInput {
    async fn consume(&self, _ctx: &CancellationToken) -> CollaboratorResult<Option<u32>> {
        let failing = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if failing.is_ok() {
            return Err(anyhow!("source unavailable"));
        }

        let value = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        if value > self.total {
            self.next.store(self.total, Ordering::SeqCst);
            return Ok(None);
        }
        Ok(Some(value))
    }

    async fn commit_progress(&self, _ctx: &CancellationToken, message: &InputMessage<u32>) -> CollaboratorResult<()> {
        let sequence = message.sequence();
        self.committed.lock().unwrap().push(sequence);
        if self.failing_commits.contains(&sequence) {
            return Err(anyhow!("commit rejected for {sequence}"));
        }
        Ok(())
    }

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StubExtractor {
    pub behavior: Behavior,
    pub callbacks: Callbacks,
}

impl StubExtractor {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            callbacks: Callbacks::default(),
        }
    }
}

#[async_trait]
impl Extractor<u32, u32> for StubExtractor {
    async fn unmarshal(&self, _ctx: &CancellationToken, message: &InputMessage<u32>) -> CollaboratorResult<u32> {
        let value = message.raw().copied().ok_or_else(|| anyhow!("empty record"))?;
        self.behavior.apply(value).await?;
        Ok(value)
    }

    async fn on_success(&self, _ctx: &CancellationToken, _message: &InputMessage<u32>) {
        self.callbacks.success();
    }

    async fn on_error(&self, _ctx: &CancellationToken, _message: &InputMessage<u32>, _error: &CollaboratorError) {
        self.callbacks.error();
    }
}

#[derive(Debug, Default)]
pub struct StubTransformer {
    pub behavior: Behavior,
    pub callbacks: Callbacks,
}

impl StubTransformer {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            callbacks: Callbacks::default(),
        }
    }
}

#[async_trait]
impl Transformer<u32, u32> for StubTransformer {
    async fn process(&self, _ctx: &CancellationToken, value: &u32) -> CollaboratorResult<OutputMessage<u32>> {
        self.behavior.apply(*value).await?;
        Ok(OutputMessage::new(*value).with_header("stage", "transform"))
    }

    async fn on_success(&self, _ctx: &CancellationToken, _value: &u32) {
        self.callbacks.success();
    }

    async fn on_error(&self, _ctx: &CancellationToken, _value: &u32, _error: &CollaboratorError) {
        self.callbacks.error();
    }
}

/// Output recording every delivered payload.
#[derive(Debug, Default)]
pub struct StubOutput {
    pub behavior: Behavior,
    pub callbacks: Callbacks,
    sent: Mutex<Vec<u32>>,
    closed: std::sync::atomic::AtomicBool,
}

impl StubOutput {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<u32> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Output<u32> for StubOutput {
    async fn send(&self, _ctx: &CancellationToken, message: &OutputMessage<u32>) -> CollaboratorResult<()> {
        self.behavior.apply(message.payload).await?;
        self.sent.lock().unwrap().push(message.payload);
        Ok(())
    }

    async fn on_success(&self, _ctx: &CancellationToken, _message: &OutputMessage<u32>) {
        self.callbacks.success();
    }

    async fn on_error(&self, _ctx: &CancellationToken, _message: &OutputMessage<u32>, _error: &CollaboratorError) {
        self.callbacks.error();
    }

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Wire the given stubs into a pipeline.
pub fn build_pipeline(
    config: PipelineConfig,
    input: Arc<StubInput>,
    extractor: Arc<StubExtractor>,
    transformer: Arc<StubTransformer>,
    output: Arc<StubOutput>,
) -> Pipeline<u32, u32, u32> {
    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline
        .set_input(input)
        .unwrap()
        .set_extractor(extractor)
        .unwrap()
        .set_transformer(transformer)
        .unwrap()
        .set_output(output)
        .unwrap();
    pipeline
}

/// A pipeline that passes every record straight through.
pub fn echo_pipeline(
    input: StubInput,
    config: PipelineConfig,
) -> (Pipeline<u32, u32, u32>, Arc<StubInput>, Arc<StubOutput>) {
    let input = Arc::new(input);
    let output = Arc::new(StubOutput::default());

    let mut pipeline = Pipeline::new(config).unwrap();
    pipeline
        .set_input(input.clone())
        .unwrap()
        .set_extractor(Arc::new(StubExtractor::default()))
        .unwrap()
        .set_transformer(Arc::new(IdentityTransformer))
        .unwrap()
        .set_output(output.clone())
        .unwrap();

    (pipeline, input, output)
}
