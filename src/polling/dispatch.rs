//! Dispatch stage
//!
//! Runs every update of a batch through the pipeline, one at a time and in
//! arrival order. Each update gets its own execution scope, released as soon
//! as its invocation is over, whatever the outcome.
//!
//! A failing pipeline invocation never aborts the batch: the error is
//! reported and the next update is dispatched. A scope that cannot be
//! created does abort it, since no update can be processed without one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::client::BotHandle;
use super::pipeline::{Pipeline, UpdateContext};
use super::report::{ReportContext, Reporter};
use super::scope::{ExecutionScope, ScopeFactory, ScopeGuard};
use super::stats::PollStats;
use super::update::Update;
use crate::error::PollError;

/// Result of dispatching one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Id of the last update of the batch, `None` when the batch was empty.
    pub last_update_id: Option<i64>,
    /// Updates handed to the pipeline, failed ones included.
    pub dispatched: usize,
    /// Updates whose pipeline invocation failed or panicked.
    pub failed: usize,
}

/// Invokes the pipeline for every update of a batch.
pub struct Dispatcher {
    pipeline: Arc<dyn Pipeline>,
    scopes: Arc<dyn ScopeFactory>,
    reporter: Arc<dyn Reporter>,
    stats: Arc<PollStats>,
}

impl Dispatcher {
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        scopes: Arc<dyn ScopeFactory>,
        reporter: Arc<dyn Reporter>,
        stats: Arc<PollStats>,
    ) -> Self {
        Self {
            pipeline,
            scopes,
            reporter,
            stats,
        }
    }

    /// Dispatches `batch` sequentially and returns what the cursor needs.
    ///
    /// Stops at the first update whose scope cannot be created and returns
    /// [`PollError::Scope`]; the caller must not advance the cursor then.
    pub async fn dispatch_batch(
        &self,
        bot: &BotHandle,
        batch: Vec<Update>,
        cancel: &CancellationToken,
    ) -> Result<DispatchSummary, PollError> {
        let mut summary = DispatchSummary {
            last_update_id: batch.last().map(|update| update.id),
            ..DispatchSummary::default()
        };

        for update in batch {
            let update_id = update.id;
            let scope = self
                .scopes
                .create_scope()
                .map_err(|source| PollError::Scope { update_id, source })?;

            if let Err(err) = self.dispatch_one(bot, update, scope, cancel).await {
                self.reporter
                    .report_error(ReportContext::Pipeline { update_id }, &*err);
                self.stats.record_dispatch(true);
                summary.failed += 1;
            } else {
                self.stats.record_dispatch(false);
            }
            summary.dispatched += 1;
        }

        if summary.dispatched > 0 {
            tracing::debug!(
                target: "botpoll::polling::dispatch",
                bot = bot.name(),
                dispatched = summary.dispatched,
                failed = summary.failed,
                last_update_id = ?summary.last_update_id,
                "Dispatched batch"
            );
        }

        Ok(summary)
    }

    async fn dispatch_one(
        &self,
        bot: &BotHandle,
        update: Update,
        scope: Box<dyn ExecutionScope>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut ctx = UpdateContext::new(bot.clone(), update, ScopeGuard::new(scope));

        let result = AssertUnwindSafe(self.pipeline.invoke(&ctx, cancel))
            .catch_unwind()
            .await;

        ctx.release_scope();

        match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(anyhow!(
                "pipeline panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
