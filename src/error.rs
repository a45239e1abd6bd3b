//! Error types for the polling core.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a [`BotClient`](crate::polling::BotClient) transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("bot API error {code}: {description}")]
    Api { code: i32, description: String },

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors produced by the polling loop itself.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to resolve bot '{bot}'")]
    BotResolution {
        bot: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to clear webhook for bot '{bot}'")]
    ClearWebhook {
        bot: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid poll request: {0}")]
    InvalidRequest(String),

    #[error("failed to create execution scope for update {update_id}")]
    Scope {
        update_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("cursor regression: offset {current} cannot move back to {proposed}")]
    CursorRegression { current: i64, proposed: i64 },

    #[error("cursor overflow: update id {0} has no successor")]
    CursorOverflow(i64),

    #[error("invalid poller configuration: {0}")]
    Configuration(String),

    #[error("polling cancelled")]
    Cancelled,
}

/// Returned by cancellable operations when the token fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

impl From<Cancelled> for PollError {
    fn from(_: Cancelled) -> Self {
        PollError::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, PollError>;
