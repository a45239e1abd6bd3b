//! Scripted collaborators for polling loop tests.
#![allow(dead_code)]

use std::any::Any;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use botpoll::polling::error_chain;
use botpoll::{
    BotClient, BotHandle, CancellationToken, ExecutionScope, Pipeline, PollRequest, PollerState,
    ReportContext, Reporter, ScopeFactory, StaticBotProvider, TransportError, Update,
    UpdateContext,
};
use tokio::sync::watch;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn batch(ids: &[i64]) -> Result<Vec<Update>, TransportError> {
    Ok(ids.iter().copied().map(Update::bare).collect())
}

pub fn network_error(message: &str) -> Result<Vec<Update>, TransportError> {
    Err(TransportError::Network(message.to_string()))
}

/// Bot client replaying a fixed list of responses.
///
/// Once the script is exhausted the client cancels `stop` and reports the
/// request as cancelled, which ends the run. The offset of every request is
/// recorded, the final one included, so tests can read where the cursor
/// ended up.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<Vec<Update>, TransportError>>>,
    offsets: Mutex<Vec<i64>>,
    states: Mutex<Vec<PollerState>>,
    observer: OnceLock<watch::Receiver<PollerState>>,
    webhook_error: Mutex<Option<TransportError>>,
    webhook_calls: AtomicUsize,
    stop: CancellationToken,
}

impl ScriptedClient {
    pub fn new(
        script: Vec<Result<Vec<Update>, TransportError>>,
        stop: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
            states: Mutex::new(Vec::new()),
            observer: OnceLock::new(),
            webhook_error: Mutex::new(None),
            webhook_calls: AtomicUsize::new(0),
            stop,
        })
    }

    pub fn fail_webhook(&self, err: TransportError) {
        *self.webhook_error.lock().unwrap() = Some(err);
    }

    /// Records the manager state seen by every fetch.
    pub fn observe(&self, states: watch::Receiver<PollerState>) {
        let _ = self.observer.set(states);
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<PollerState> {
        self.states.lock().unwrap().clone()
    }

    pub fn webhook_calls(&self) -> usize {
        self.webhook_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BotClient for ScriptedClient {
    async fn delete_webhook(&self, _cancel: &CancellationToken) -> Result<(), TransportError> {
        self.webhook_calls.fetch_add(1, Ordering::SeqCst);
        match self.webhook_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_updates(
        &self,
        request: &PollRequest,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(request.offset);
        if let Some(observer) = self.observer.get() {
            self.states.lock().unwrap().push(*observer.borrow());
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => {
                self.stop.cancel();
                Err(TransportError::Cancelled)
            }
        }
    }
}

pub fn provider(name: &str, client: Arc<ScriptedClient>) -> Arc<StaticBotProvider> {
    Arc::new(StaticBotProvider::new().with_bot(BotHandle::new(name, client)))
}

/// Pipeline recording every invocation; fails or panics on chosen ids.
#[derive(Default)]
pub struct RecordingPipeline {
    invoked: Mutex<Vec<i64>>,
    fail_on: Vec<i64>,
    panic_on: Vec<i64>,
    live_scopes: Option<Arc<CountingScopeFactory>>,
    max_live_scopes: AtomicUsize,
}

impl RecordingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, ids: &[i64]) -> Self {
        self.fail_on = ids.to_vec();
        self
    }

    pub fn panicking_on(mut self, ids: &[i64]) -> Self {
        self.panic_on = ids.to_vec();
        self
    }

    pub fn watching(mut self, scopes: Arc<CountingScopeFactory>) -> Self {
        self.live_scopes = Some(scopes);
        self
    }

    pub fn invoked(&self) -> Vec<i64> {
        self.invoked.lock().unwrap().clone()
    }

    pub fn max_live_scopes(&self) -> usize {
        self.max_live_scopes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pipeline for RecordingPipeline {
    async fn invoke(&self, ctx: &UpdateContext, _cancel: &CancellationToken) -> anyhow::Result<()> {
        let id = ctx.update().id;
        self.invoked.lock().unwrap().push(id);

        if let Some(scopes) = &self.live_scopes {
            assert!(ctx.scope().as_any().downcast_ref::<CountingScope>().is_some());
            self.max_live_scopes
                .fetch_max(scopes.live(), Ordering::SeqCst);
        }
        tokio::task::yield_now().await;

        if self.panic_on.contains(&id) {
            panic!("handler for update {id} panicked");
        }
        if self.fail_on.contains(&id) {
            anyhow::bail!("handler rejected update {id}");
        }
        Ok(())
    }
}

pub struct CountingScope {
    factory: Arc<Counters>,
}

impl ExecutionScope for CountingScope {
    fn release(&mut self) {
        self.factory.released.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    released: AtomicUsize,
}

/// Scope factory counting creations and releases.
#[derive(Default)]
pub struct CountingScopeFactory {
    counters: Arc<Counters>,
    fail_from: Option<usize>,
}

impl CountingScopeFactory {
    /// Fails every creation once `n` scopes have been handed out.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.created() - self.released()
    }
}

impl ScopeFactory for CountingScopeFactory {
    fn create_scope(&self) -> anyhow::Result<Box<dyn ExecutionScope>> {
        if self.fail_from.is_some_and(|n| self.created() >= n) {
            anyhow::bail!("container disposed");
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingScope {
            factory: self.counters.clone(),
        }))
    }
}

/// Reporter keeping every report with its rendered error chain.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(ReportContext, String)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(ReportContext, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn contexts(&self) -> Vec<ReportContext> {
        self.reports().into_iter().map(|(context, _)| context).collect()
    }
}

impl Reporter for RecordingReporter {
    fn report_error(&self, context: ReportContext, error: &(dyn Error + 'static)) {
        self.reports
            .lock()
            .unwrap()
            .push((context, error_chain(error)));
    }
}
