//! Botpoll sample - update polling against an in-memory bot API
//!
//! A producer task keeps pushing messages into a [`SampleClient`] while the
//! polling manager pulls them and logs each one. Every fifth message is a
//! `/boom` command the pipeline rejects, to show that one failing update
//! does not stop the others.
//!
//! # Usage
//!
//! ```bash
//! # Poll until Ctrl+C
//! RUST_LOG=botpoll=debug,botpoll_sample=info botpoll-sample
//!
//! # Fail every third pull request and stop after 20 seconds
//! botpoll-sample --fail-every 3 --retry-delay-secs 1 --run-for-secs 20
//! ```

mod config;

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use botpoll::{
    shutdown_signal, BotHandle, ExecutionScope, Pipeline, PipelineBuilder, PollOutcome,
    PollerConfig, SampleClient, ScopeFactory, StaticBotProvider, UpdateContext, UpdateKind,
    UpdatePollingManager,
};
use clap::Parser;
use config::Config;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Logs every update and rejects `/boom` commands.
struct LoggingPipeline;

#[async_trait]
impl Pipeline for LoggingPipeline {
    async fn invoke(&self, ctx: &UpdateContext, _cancel: &CancellationToken) -> Result<()> {
        let update = ctx.update();
        let text = update
            .body()
            .and_then(|body| body.get("text"))
            .and_then(|text| text.as_str())
            .unwrap_or_default();

        if text == "/boom" {
            anyhow::bail!("command /boom is not supported");
        }

        let seq = ctx
            .scope()
            .as_any()
            .downcast_ref::<TimingScope>()
            .map(|scope| scope.seq);

        tracing::info!(
            target: "botpoll_sample::pipeline",
            bot = ctx.bot().name(),
            update_id = update.id,
            kind = ?update.kind(),
            scope = ?seq,
            text,
            "Handled update"
        );
        Ok(())
    }
}

struct LoggingPipelineBuilder;

impl PipelineBuilder for LoggingPipelineBuilder {
    fn build(&self) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(LoggingPipeline))
    }
}

/// Scope that logs how long its update took once released.
struct TimingScope {
    seq: u64,
    started: Instant,
}

impl ExecutionScope for TimingScope {
    fn release(&mut self) {
        tracing::debug!(
            target: "botpoll_sample::scope",
            scope = self.seq,
            elapsed = ?self.started.elapsed(),
            "Scope released"
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct TimingScopeFactory {
    next: AtomicU64,
}

impl ScopeFactory for TimingScopeFactory {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>> {
        Ok(Box::new(TimingScope {
            seq: self.next.fetch_add(1, Ordering::Relaxed),
            started: Instant::now(),
        }))
    }
}

/// Pushes a message every `interval` until cancelled.
async fn produce(client: Arc<SampleClient>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    let mut n: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        n += 1;
        let text = if n % 5 == 0 {
            "/boom".to_string()
        } else {
            format!("hello #{n}")
        };
        let id = client.push(
            UpdateKind::Message,
            json!({ "message_id": n, "chat": { "id": 1, "type": "private" }, "text": text }),
        );
        tracing::trace!(target: "botpoll_sample::producer", update_id = id, "Produced update");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let mut poller_config = PollerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut poller_config);

    tracing::info!("Starting botpoll sample");
    tracing::info!("Bot: {}", poller_config.bot);
    tracing::info!("Retry delay: {}s", poller_config.retry_delay_secs);
    tracing::info!("Produce interval: {}ms", cli.produce_interval_ms);

    // The sample bot starts with a webhook registered, which startup clears.
    let client = Arc::new(
        SampleClient::new()
            .with_webhook()
            .with_fail_every(cli.fail_every),
    );
    let provider = StaticBotProvider::new()
        .with_bot(BotHandle::new(poller_config.bot.clone(), client.clone()));

    let manager = UpdatePollingManager::builder()
        .with_config(&poller_config)
        .provider(Arc::new(provider))
        .pipeline_builder(LoggingPipelineBuilder)
        .scope_factory(Arc::new(TimingScopeFactory::default()))
        .build()?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    if let Some(secs) = cli.run_for_secs {
        let deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::info!("Run time elapsed, stopping");
            deadline.cancel();
        });
    }

    let producer = tokio::spawn(produce(
        client.clone(),
        Duration::from_millis(cli.produce_interval_ms.max(1)),
        cancel.clone(),
    ));

    let outcome = manager.run(None, &cancel).await;

    // A fatal outcome leaves the producer running.
    cancel.cancel();
    producer.await?;

    tracing::info!(
        stats = %serde_json::to_string(&manager.stats())?,
        pending = client.pending(),
        "Polling finished"
    );

    match outcome {
        PollOutcome::Cancelled => Ok(()),
        PollOutcome::Fatal(err) => Err(err.into()),
    }
}
