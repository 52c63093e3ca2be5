// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use kq_pipeline::backends::{ChannelInput, IdentityTransformer, JsonExtractor};
use kq_pipeline::config::{load_and_validate_config, PipelineConfig};
use kq_pipeline::engine::{OutputMessage, Pipeline};
use kq_pipeline::errors::CollaboratorResult;
use kq_pipeline::observability::init_tracing;
use kq_pipeline::traits::Output;

type Json = serde_json::Value;

/// Writes each payload to stdout as one JSON line.
struct StdoutOutput;

#[async_trait]
impl Output<Json> for StdoutOutput {
    async fn send(&self, _ctx: &CancellationToken, message: &OutputMessage<Json>) -> CollaboratorResult<()> {
        println!("{}", message.payload);
        Ok(())
    }
}

/// Pipe JSON lines from stdin through the pipeline and print them to stdout.
///
/// Usage: `kq-pipeline [config.yaml|config.toml]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path)?,
        None => PipelineConfig::default(),
    };

    let (input, feed) = ChannelInput::<Vec<u8>>::new(config.ingest_queue_capacity);
    let input = Arc::new(input);

    let mut pipeline = Pipeline::<Vec<u8>, Json, Json>::new(config)?;
    pipeline
        .set_input(input.clone())?
        .set_extractor(Arc::new(JsonExtractor::<Json>::new()))?
        .set_transformer(Arc::new(IdentityTransformer))?
        .set_output(Arc::new(StdoutOutput))?;

    let ctx = CancellationToken::new();
    let start_time = Instant::now();
    pipeline.start(ctx.clone())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut fed = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                ctx.cancel();
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if feed.send(line.into_bytes()).await.is_err() {
                        break;
                    }
                    fed += 1;
                }
                None => break,
            },
        }
    }
    drop(feed);

    if !ctx.is_cancelled() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => ctx.cancel(),
            _ = input.wait_for_commits(fed) => {}
        }
    }
    pipeline.shutdown().await?;

    let stats = pipeline.stats();
    eprintln!(
        "ingested={} committed={} extract_failures={} elapsed={:?}",
        stats.ingested,
        stats.committed,
        stats.extract_failures,
        start_time.elapsed()
    );
    Ok(())
}
