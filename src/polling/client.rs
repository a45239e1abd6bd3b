//! Transport seam and bot resolution.
//!
//! The polling core never talks HTTP itself. A [`BotClient`] performs the two
//! remote calls it needs, and a [`BotProvider`] hands out the client of a named bot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::request::PollRequest;
use super::update::Update;
use crate::error::TransportError;

/// Remote calls used by the polling loop.
///
/// Implementations must return promptly once `cancel` fires instead of
/// retrying past it; [`TransportError::Cancelled`] is the expected error then.
#[async_trait]
pub trait BotClient: Send + Sync {
    /// Removes any webhook so that pull delivery is authoritative.
    async fn delete_webhook(&self, cancel: &CancellationToken) -> Result<(), TransportError>;

    /// Fetches the next batch of updates starting at `request.offset`.
    ///
    /// Updates must come back in increasing id order. The batch may be empty
    /// when the long-poll timeout elapses.
    async fn get_updates(
        &self,
        request: &PollRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Update>, TransportError>;
}

/// Resolved bot: a name plus its transport client.
#[derive(Clone)]
pub struct BotHandle {
    name: String,
    client: Arc<dyn BotClient>,
}

impl BotHandle {
    pub fn new(name: impl Into<String>, client: Arc<dyn BotClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Arc<dyn BotClient> {
        &self.client
    }
}

impl fmt::Debug for BotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotHandle").field("name", &self.name).finish()
    }
}

/// Resolves bot handles by name.
#[async_trait]
pub trait BotProvider: Send + Sync {
    async fn resolve(&self, bot: &str) -> Result<BotHandle>;
}

/// Provider backed by a fixed set of registered bots.
#[derive(Default)]
pub struct StaticBotProvider {
    bots: HashMap<String, BotHandle>,
}

impl StaticBotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bot, replacing any previous one with the same name.
    pub fn register(&mut self, handle: BotHandle) {
        tracing::debug!(
            target: "botpoll::polling::client",
            bot = handle.name(),
            "registered bot"
        );
        self.bots.insert(handle.name().to_string(), handle);
    }

    pub fn with_bot(mut self, handle: BotHandle) -> Self {
        self.register(handle);
        self
    }
}

#[async_trait]
impl BotProvider for StaticBotProvider {
    async fn resolve(&self, bot: &str) -> Result<BotHandle> {
        self.bots
            .get(bot)
            .cloned()
            .ok_or_else(|| anyhow!("no bot registered under '{bot}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullClient;

    #[async_trait]
    impl BotClient for NullClient {
        async fn delete_webhook(&self, _cancel: &CancellationToken) -> Result<(), TransportError> {
            Ok(())
        }

        async fn get_updates(
            &self,
            _request: &PollRequest,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Update>, TransportError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_static_provider_resolves_registered_bots() {
        let provider =
            StaticBotProvider::new().with_bot(BotHandle::new("echo", Arc::new(NullClient)));

        let handle = provider.resolve("echo").await.unwrap();
        assert_eq!(handle.name(), "echo");

        let err = provider.resolve("missing").await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
