//! Update polling manager
//!
//! Owns the polling loop of one bot:
//!
//! ```text
//! Starting ──> Running ──> Stopping ──> Stopped
//!    │
//!    └──> Fatal
//! ```
//!
//! `Starting` resolves the bot and clears its webhook. `Running` repeats
//! fetch, dispatch and cursor advance until the cancellation token fires.
//! Errors inside an iteration are reported and polling goes on. A startup
//! failure, or a scope factory that cannot create a scope, ends the run with
//! [`PollOutcome::Fatal`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::backoff::RetryPolicy;
use super::client::{BotHandle, BotProvider};
use super::cursor::CursorTracker;
use super::dispatch::{DispatchSummary, Dispatcher};
use super::fetch::Fetcher;
use super::pipeline::{Pipeline, PipelineBuilder};
use super::report::{ReportContext, Reporter, TracingReporter};
use super::request::PollRequest;
use super::scope::{EmptyScopeFactory, ScopeFactory};
use super::stats::{PollStats, PollStatsSnapshot};
use crate::config::PollerConfig;
use crate::error::PollError;

/// Lifecycle of a polling manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Constructed, never run.
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Startup or scope creation failed; see the outcome of the run.
    Fatal,
}

/// How a run ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The cancellation token fired. Expected termination.
    Cancelled,
    /// A startup step failed, or an execution scope could not be created.
    Fatal(PollError),
}

impl PollOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollOutcome::Cancelled)
    }
}

/// Pull-based update loop for one bot.
pub struct UpdatePollingManager {
    bot: String,
    provider: Arc<dyn BotProvider>,
    default_request: PollRequest,
    fetcher: Fetcher,
    dispatcher: Dispatcher,
    reporter: Arc<dyn Reporter>,
    stats: Arc<PollStats>,
    state: watch::Sender<PollerState>,
}

impl UpdatePollingManager {
    pub fn builder() -> UpdatePollingManagerBuilder {
        UpdatePollingManagerBuilder::default()
    }

    /// Name of the bot this manager polls for.
    pub fn bot(&self) -> &str {
        &self.bot
    }

    /// Request used by [`run`](Self::run) when the caller passes none.
    pub fn default_request(&self) -> &PollRequest {
        &self.default_request
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> PollStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs the polling loop until `cancel` fires, startup fails or an
    /// execution scope cannot be created.
    ///
    /// `request` overrides the default request; its offset is where polling
    /// starts. The cursor lives only for the duration of this call.
    pub async fn run(
        &self,
        request: Option<PollRequest>,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        self.transition(PollerState::Starting);

        let (bot, mut request) = match self.start(request, cancel).await {
            Ok(started) => started,
            Err(PollError::Cancelled) => return self.stop(),
            Err(err) => return self.fail(ReportContext::Startup, err),
        };

        self.transition(PollerState::Running);
        tracing::info!(
            target: "botpoll::polling",
            bot = bot.name(),
            offset = request.offset,
            timeout = ?request.timeout,
            allowed_updates = ?request.allowed_updates,
            "Polling started"
        );

        let mut cursor = CursorTracker::new(request.offset);

        while !cancel.is_cancelled() {
            match self.poll_once(&bot, &mut request, &mut cursor, cancel).await {
                Ok(_) => {}
                Err(PollError::Cancelled) => break,
                Err(err @ PollError::Scope { update_id, .. }) => {
                    tracing::error!(
                        target: "botpoll::polling",
                        bot = bot.name(),
                        offset = cursor.offset(),
                        update_id,
                        "Execution scope unavailable, stopping polling"
                    );
                    return self.fail(ReportContext::Scope { update_id }, err);
                }
                Err(err) => {
                    self.stats.record_iteration_error();
                    self.reporter.report_error(ReportContext::Iteration, &err);
                    self.pause_after_error(cancel).await;
                }
            }
        }

        tracing::info!(
            target: "botpoll::polling",
            bot = bot.name(),
            offset = cursor.offset(),
            "Cancellation requested, stopping polling"
        );
        self.stop()
    }

    async fn start(
        &self,
        request: Option<PollRequest>,
        cancel: &CancellationToken,
    ) -> Result<(BotHandle, PollRequest), PollError> {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let bot = self
            .provider
            .resolve(&self.bot)
            .await
            .map_err(|source| PollError::BotResolution {
                bot: self.bot.clone(),
                source,
            })?;

        let request = request.unwrap_or_else(|| self.default_request.clone());
        request.validate().map_err(PollError::InvalidRequest)?;

        self.fetcher.clear_push_delivery(&bot, cancel).await?;

        Ok((bot, request))
    }

    /// Fetch, dispatch, advance. The cursor only moves once the whole batch
    /// went through the pipeline, failed updates included. A scope failure
    /// leaves it where it was.
    async fn poll_once(
        &self,
        bot: &BotHandle,
        request: &mut PollRequest,
        cursor: &mut CursorTracker,
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, PollError> {
        let batch = self.fetcher.fetch(bot, request, cancel).await?;
        let summary = self.dispatcher.dispatch_batch(bot, batch, cancel).await?;

        request.offset = cursor.advance(summary.last_update_id)?;

        Ok(summary)
    }

    /// Waits one retry delay after an iteration error.
    ///
    /// Fetch failures are retried inside the fetch stage and scope failures
    /// end the run, so in practice this only follows a cursor regression or
    /// overflow, where the next fetch would otherwise come back at once.
    async fn pause_after_error(&self, cancel: &CancellationToken) {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(self.fetcher.policy().delay) => {}
        }
    }

    fn fail(&self, context: ReportContext, err: PollError) -> PollOutcome {
        self.reporter.report_error(context, &err);
        self.transition(PollerState::Fatal);
        PollOutcome::Fatal(err)
    }

    fn stop(&self) -> PollOutcome {
        self.transition(PollerState::Stopping);
        self.transition(PollerState::Stopped);
        PollOutcome::Cancelled
    }

    fn transition(&self, next: PollerState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(
            target: "botpoll::polling",
            bot = %self.bot,
            from = ?previous,
            to = ?next,
            "State transition"
        );
    }
}

/// Builder for [`UpdatePollingManager`].
#[derive(Default)]
pub struct UpdatePollingManagerBuilder {
    bot: Option<String>,
    provider: Option<Arc<dyn BotProvider>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    pipeline_builder: Option<Box<dyn PipelineBuilder>>,
    scopes: Option<Arc<dyn ScopeFactory>>,
    reporter: Option<Arc<dyn Reporter>>,
    retry_policy: Option<RetryPolicy>,
    request: Option<PollRequest>,
}

impl UpdatePollingManagerBuilder {
    /// Name the bot is resolved by.
    pub fn bot(mut self, bot: impl Into<String>) -> Self {
        self.bot = Some(bot.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn BotProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Uses an already built pipeline.
    pub fn pipeline(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Builds the pipeline once in [`build`](Self::build). Ignored if
    /// [`pipeline`](Self::pipeline) is also set.
    pub fn pipeline_builder(mut self, builder: impl PipelineBuilder + 'static) -> Self {
        self.pipeline_builder = Some(Box::new(builder));
        self
    }

    /// Defaults to [`EmptyScopeFactory`].
    pub fn scope_factory(mut self, scopes: Arc<dyn ScopeFactory>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Defaults to [`TracingReporter`].
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Request used when [`UpdatePollingManager::run`] is given none.
    pub fn default_request(mut self, request: PollRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Applies bot name, retry delay and default request from a config.
    pub fn with_config(self, config: &PollerConfig) -> Self {
        self.bot(config.bot.clone())
            .retry_policy(config.retry_policy())
            .default_request(config.request())
    }

    pub fn build(self) -> Result<UpdatePollingManager, PollError> {
        let bot = self
            .bot
            .filter(|bot| !bot.trim().is_empty())
            .ok_or_else(|| PollError::Configuration("a bot name is required".to_string()))?;
        let provider = self
            .provider
            .ok_or_else(|| PollError::Configuration("a bot provider is required".to_string()))?;

        let pipeline = match (self.pipeline, self.pipeline_builder) {
            (Some(pipeline), _) => pipeline,
            (None, Some(builder)) => builder.build().map_err(|err| {
                PollError::Configuration(format!("failed to build pipeline: {err:#}"))
            })?,
            (None, None) => {
                return Err(PollError::Configuration(
                    "a pipeline or pipeline builder is required".to_string(),
                ))
            }
        };

        let scopes = self
            .scopes
            .unwrap_or_else(|| Arc::new(EmptyScopeFactory));
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(TracingReporter));
        let stats = Arc::new(PollStats::default());

        let fetcher = Fetcher::new(
            self.retry_policy.unwrap_or_default(),
            reporter.clone(),
            stats.clone(),
        );
        let dispatcher = Dispatcher::new(pipeline, scopes, reporter.clone(), stats.clone());
        let (state, _) = watch::channel(PollerState::Idle);

        Ok(UpdatePollingManager {
            bot,
            provider,
            default_request: self.request.unwrap_or_default(),
            fetcher,
            dispatcher,
            reporter,
            stats,
            state,
        })
    }
}
