//! Botpoll - long-polling update loop for chat bots.
//!
//! A [`UpdatePollingManager`] pulls batches of updates from a bot API,
//! runs each update through a caller-supplied [`Pipeline`] inside its own
//! execution scope, and advances the offset cursor once the batch is done.
//! Transient fetch failures are retried forever with a fixed delay; only
//! cancellation or a startup failure ends a run.
//!
//! ```rust,ignore
//! let client = Arc::new(SampleClient::new());
//! let provider = StaticBotProvider::new().with_bot(BotHandle::new("echo", client));
//!
//! let manager = UpdatePollingManager::builder()
//!     .bot("echo")
//!     .provider(Arc::new(provider))
//!     .pipeline(PipelineFn::arc(|ctx, _cancel| {
//!         Box::pin(async move {
//!             tracing::info!("update {}", ctx.update().id);
//!             Ok::<_, anyhow::Error>(())
//!         })
//!     }))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(shutdown_signal(cancel.clone()));
//! let outcome = manager.run(None, &cancel).await;
//! ```

pub mod config;
pub mod error;
pub mod polling;
pub mod shutdown;

// Re-export commonly used types for pipeline and client authors
pub use async_trait::async_trait;
pub use tokio;
pub use tokio_util::sync::CancellationToken;

pub use config::PollerConfig;
pub use error::{Cancelled, PollError, Result, TransportError};
pub use polling::{
    BotClient, BotHandle, BotProvider, ExecutionScope, Pipeline, PipelineBuilder, PipelineFn,
    PollOutcome, PollRequest, PollerState, ReportContext, Reporter, RetryPolicy, SampleClient,
    ScopeFactory, StaticBotProvider, Update, UpdateContext, UpdateKind, UpdatePollingManager,
};
pub use shutdown::shutdown_signal;
