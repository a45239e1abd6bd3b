pub mod backoff;
pub mod client;
pub mod cursor;
pub mod dispatch;
pub mod fetch;
pub mod manager;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod sample;
pub mod scope;
pub mod stats;
pub mod update;

pub use backoff::{RetryPolicy, DEFAULT_RETRY_DELAY};
pub use client::{BotClient, BotHandle, BotProvider, StaticBotProvider};
pub use cursor::CursorTracker;
pub use dispatch::{DispatchSummary, Dispatcher};
pub use fetch::Fetcher;
pub use manager::{PollOutcome, PollerState, UpdatePollingManager, UpdatePollingManagerBuilder};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineFn, UpdateContext};
pub use report::{error_chain, ReportContext, Reporter, TracingReporter};
pub use request::{PollRequest, UpdateKind, DEFAULT_POLL_TIMEOUT};
pub use sample::SampleClient;
pub use scope::{EmptyScope, EmptyScopeFactory, ExecutionScope, ScopeFactory, ScopeGuard};
pub use stats::{PollStats, PollStatsSnapshot};
pub use update::Update;
