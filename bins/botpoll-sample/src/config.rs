//! Command line for the sample poller

use std::path::PathBuf;

use botpoll::PollerConfig;
use clap::Parser;

/// Polls an in-memory bot API fed by a background producer
///
/// Settings are read from the optional config file and `BOTPOLL_*`
/// variables first; flags given here win over both.
#[derive(Parser, Debug)]
#[command(name = "botpoll-sample")]
#[command(about = "Run the update polling loop against a sample bot", long_about = None)]
pub struct Config {
    /// Poller config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bot name
    #[arg(long)]
    pub bot: Option<String>,

    /// Delay between failed fetch attempts, in seconds
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Long-poll timeout, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Interval between produced updates, in milliseconds
    #[arg(long, default_value = "750")]
    pub produce_interval_ms: u64,

    /// Fail every n-th pull request (0 = never)
    #[arg(long, default_value = "0")]
    pub fail_every: u64,

    /// Stop after this many seconds instead of waiting for a signal
    #[arg(long)]
    pub run_for_secs: Option<u64>,
}

impl Config {
    /// Applies the flags that were given on top of `poller`.
    pub fn apply(&self, poller: &mut PollerConfig) {
        if let Some(bot) = &self.bot {
            poller.bot.clone_from(bot);
        }
        if let Some(delay) = self.retry_delay_secs {
            poller.retry_delay_secs = delay;
        }
        if let Some(timeout) = self.timeout_secs {
            poller.timeout_secs = timeout;
        }
    }
}
