//! Fetch stage: one-time webhook clear and retried pull requests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::backoff::RetryPolicy;
use super::client::BotHandle;
use super::report::{ReportContext, Reporter};
use super::request::PollRequest;
use super::stats::PollStats;
use super::update::Update;
use crate::error::{Cancelled, PollError};

/// Issues pull requests for a bot under a [`RetryPolicy`].
pub struct Fetcher {
    policy: RetryPolicy,
    reporter: Arc<dyn Reporter>,
    stats: Arc<PollStats>,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy, reporter: Arc<dyn Reporter>, stats: Arc<PollStats>) -> Self {
        Self {
            policy,
            reporter,
            stats,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Removes the bot's webhook so that pull delivery is authoritative.
    ///
    /// Not retried: a failure here ends the run.
    pub async fn clear_push_delivery(
        &self,
        bot: &BotHandle,
        cancel: &CancellationToken,
    ) -> Result<(), PollError> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PollError::Cancelled),
            result = bot.client().delete_webhook(cancel) => result,
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    target: "botpoll::polling::fetch",
                    bot = bot.name(),
                    "Webhook cleared, pull delivery is authoritative"
                );
                Ok(())
            }
            Err(_) if cancel.is_cancelled() => Err(PollError::Cancelled),
            Err(source) => Err(PollError::ClearWebhook {
                bot: bot.name().to_string(),
                source,
            }),
        }
    }

    /// Fetches the next batch, retrying transport failures until it succeeds.
    ///
    /// Every failed attempt is reported and counted. Only cancellation ends
    /// the call without a batch.
    pub async fn fetch(
        &self,
        bot: &BotHandle,
        request: &PollRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Update>, Cancelled> {
        let client = bot.client();

        let updates = self
            .policy
            .execute(
                cancel,
                |_| async move {
                    client.get_updates(request, cancel).await.map_err(|err| {
                        anyhow::Error::new(err).context(format!(
                            "getUpdates for bot '{}' at offset {} failed",
                            bot.name(),
                            request.offset
                        ))
                    })
                },
                |attempt, err, delay| {
                    self.stats.record_fetch_retry();
                    self.reporter
                        .report_error(ReportContext::Fetch { attempt }, &**err);
                    tracing::debug!(
                        target: "botpoll::polling::fetch",
                        bot = bot.name(),
                        attempt,
                        ?delay,
                        "Retrying fetch"
                    );
                },
            )
            .await?;

        self.stats.record_batch();
        tracing::trace!(
            target: "botpoll::polling::fetch",
            bot = bot.name(),
            offset = request.offset,
            count = updates.len(),
            "Fetched updates"
        );

        Ok(updates)
    }
}
