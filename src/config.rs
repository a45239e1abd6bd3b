//! Poller configuration, usually read from a `botpoll.toml` file.
//!
//! Every field may be overridden from the environment with a `BOTPOLL_`
//! prefix, e.g. `BOTPOLL_BOT=echo` or
//! `BOTPOLL_ALLOWED_UPDATES=message,callback_query`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::polling::{
    PollRequest, RetryPolicy, UpdateKind, DEFAULT_POLL_TIMEOUT, DEFAULT_RETRY_DELAY,
};

pub const ENV_PREFIX: &str = "BOTPOLL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Name the bot is resolved by.
    pub bot: String,
    /// Delay between failed fetch attempts.
    pub retry_delay_secs: u64,
    /// Offset polling starts from.
    pub offset: i64,
    /// Long-poll timeout sent with every request.
    pub timeout_secs: u64,
    pub limit: Option<u32>,
    /// Empty means every kind.
    pub allowed_updates: Vec<UpdateKind>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            bot: "default".to_string(),
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            offset: 0,
            timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            limit: None,
            allowed_updates: Vec::new(),
        }
    }
}

impl PollerConfig {
    /// Loads the configuration from an optional file and `BOTPOLL_*` variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(config_path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_updates"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Request the polling loop starts with.
    pub fn request(&self) -> PollRequest {
        let request = PollRequest::default()
            .with_offset(self.offset)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_allowed_updates(self.allowed_updates.clone());

        match self.limit {
            Some(limit) => request.with_limit(limit),
            None => request,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(Duration::from_secs(self.retry_delay_secs))
    }
}
