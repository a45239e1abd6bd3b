//! Pull request parameters sent with every fetch.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Long-poll timeout used when the caller does not provide a request.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(500);

/// Kinds of updates the remote source can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 14] = [
        UpdateKind::Message,
        UpdateKind::EditedMessage,
        UpdateKind::ChannelPost,
        UpdateKind::EditedChannelPost,
        UpdateKind::InlineQuery,
        UpdateKind::ChosenInlineResult,
        UpdateKind::CallbackQuery,
        UpdateKind::ShippingQuery,
        UpdateKind::PreCheckoutQuery,
        UpdateKind::Poll,
        UpdateKind::PollAnswer,
        UpdateKind::MyChatMember,
        UpdateKind::ChatMember,
        UpdateKind::ChatJoinRequest,
    ];

    /// Field name carrying this kind in an update payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Message => "message",
            UpdateKind::EditedMessage => "edited_message",
            UpdateKind::ChannelPost => "channel_post",
            UpdateKind::EditedChannelPost => "edited_channel_post",
            UpdateKind::InlineQuery => "inline_query",
            UpdateKind::ChosenInlineResult => "chosen_inline_result",
            UpdateKind::CallbackQuery => "callback_query",
            UpdateKind::ShippingQuery => "shipping_query",
            UpdateKind::PreCheckoutQuery => "pre_checkout_query",
            UpdateKind::Poll => "poll",
            UpdateKind::PollAnswer => "poll_answer",
            UpdateKind::MyChatMember => "my_chat_member",
            UpdateKind::ChatMember => "chat_member",
            UpdateKind::ChatJoinRequest => "chat_join_request",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == field)
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one pull request.
///
/// Only `offset` changes while the loop runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    /// Identifier of the first update to return. Everything below is confirmed.
    pub offset: i64,

    /// Long-poll timeout hint for the remote source.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Update kinds to receive. Empty means every kind.
    #[serde(default)]
    pub allowed_updates: Vec<UpdateKind>,

    /// Maximum number of updates per batch, remote default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl Default for PollRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            timeout: DEFAULT_POLL_TIMEOUT,
            allowed_updates: Vec::new(),
            limit: None,
        }
    }
}

impl PollRequest {
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_allowed_updates(mut self, kinds: Vec<UpdateKind>) -> Self {
        self.allowed_updates = kinds;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an update of `kind` passes the allowed-updates filter.
    pub fn allows(&self, kind: UpdateKind) -> bool {
        self.allowed_updates.is_empty() || self.allowed_updates.contains(&kind)
    }

    /// Checks the preconditions of a fetch.
    pub fn validate(&self) -> Result<(), String> {
        if self.offset < 0 {
            return Err(format!("offset must not be negative, got {}", self.offset));
        }
        if self.limit == Some(0) {
            return Err("limit must be at least 1".to_string());
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Whole seconds, rounded up so a sub-second long poll does not turn into a short poll.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs() + u64::from(value.subsec_nanos() > 0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
