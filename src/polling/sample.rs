//! In-memory bot client for demos and tests
//!
//! Updates are queued with [`SampleClient::push`] and served the way a bot
//! API long-poll endpoint would: updates below the request offset count as
//! confirmed and are dropped, a request with nothing to return waits until
//! an update arrives or the request timeout elapses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::BotClient;
use super::request::{PollRequest, UpdateKind};
use super::update::Update;
use crate::error::TransportError;

/// Batch size used when the request sets no limit.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

struct Queue {
    updates: VecDeque<Update>,
    next_id: i64,
    webhook_set: bool,
}

/// Queue-backed [`BotClient`].
pub struct SampleClient {
    queue: Mutex<Queue>,
    arrivals: Notify,
    requests: AtomicU64,
    fail_every: u64,
}

impl Default for SampleClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleClient {
    /// Creates an empty client whose first update gets id 1.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Queue {
                updates: VecDeque::new(),
                next_id: 1,
                webhook_set: false,
            }),
            arrivals: Notify::new(),
            requests: AtomicU64::new(0),
            fail_every: 0,
        }
    }

    /// Starts update ids at `id`.
    pub fn with_first_id(self, id: i64) -> Self {
        self.lock().next_id = id;
        self
    }

    /// Pretends a webhook is registered. Pull requests conflict until
    /// `delete_webhook` is called.
    pub fn with_webhook(self) -> Self {
        self.lock().webhook_set = true;
        self
    }

    /// Fails every `n`-th pull request with a network error. `0` disables.
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Queues a new update of `kind` and returns its id.
    pub fn push(&self, kind: UpdateKind, body: Value) -> i64 {
        let id = {
            let mut queue = self.lock();
            let id = queue.next_id;
            queue.next_id += 1;
            queue.updates.push_back(Update::new(id, kind, body));
            id
        };
        self.arrivals.notify_waiters();
        id
    }

    /// Queues a prebuilt update. Ids at or below the last queued one are ignored.
    pub fn push_update(&self, update: Update) -> bool {
        let accepted = {
            let mut queue = self.lock();
            if update.id < queue.next_id {
                false
            } else {
                queue.next_id = update.id.saturating_add(1);
                queue.updates.push_back(update);
                true
            }
        };
        if accepted {
            self.arrivals.notify_waiters();
        }
        accepted
    }

    /// Updates still waiting for confirmation.
    pub fn pending(&self) -> usize {
        self.lock().updates.len()
    }

    /// Pull requests received so far, failed ones included.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn webhook_set(&self) -> bool {
        self.lock().webhook_set
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Confirms everything below the offset and collects what is left.
    fn take_batch(&self, request: &PollRequest) -> Result<Vec<Update>, TransportError> {
        let mut queue = self.lock();

        if queue.webhook_set {
            return Err(TransportError::Api {
                code: 409,
                description: "Conflict: can't use getUpdates method while webhook is active"
                    .to_string(),
            });
        }

        while queue
            .updates
            .front()
            .is_some_and(|update| update.id < request.offset)
        {
            queue.updates.pop_front();
        }

        let limit = request
            .limit
            .map_or(DEFAULT_BATCH_LIMIT, |limit| limit as usize)
            .min(DEFAULT_BATCH_LIMIT);

        Ok(queue
            .updates
            .iter()
            .filter(|update| {
                request.allowed_updates.is_empty()
                    || update.kind().is_some_and(|kind| request.allows(kind))
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BotClient for SampleClient {
    async fn delete_webhook(&self, _cancel: &CancellationToken) -> Result<(), TransportError> {
        self.lock().webhook_set = false;
        Ok(())
    }

    async fn get_updates(
        &self,
        request: &PollRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Update>, TransportError> {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(TransportError::Network(format!(
                "injected failure on request {n}"
            )));
        }

        let deadline = Instant::now() + request.timeout;

        loop {
            // Register before looking at the queue so a push in between is not missed.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let batch = self.take_batch(request)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                () = &mut arrival => {}
                () = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }
}
