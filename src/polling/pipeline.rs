//! Processing pipeline seam
//!
//! The pipeline is built by the caller and opaque to the polling core. The
//! core only calls [`Pipeline::invoke`] once per update with an
//! [`UpdateContext`] binding the bot, the update and its execution scope.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::client::BotHandle;
use super::scope::{ExecutionScope, ScopeGuard};
use super::update::Update;

/// Everything a pipeline invocation gets to see about one update.
pub struct UpdateContext {
    bot: BotHandle,
    update: Update,
    scope: ScopeGuard,
}

impl UpdateContext {
    pub fn new(bot: BotHandle, update: Update, scope: ScopeGuard) -> Self {
        Self { bot, update, scope }
    }

    pub fn bot(&self) -> &BotHandle {
        &self.bot
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Per-update dependencies, valid until the invocation returns.
    pub fn scope(&self) -> &dyn ExecutionScope {
        self.scope.scope()
    }

    pub(crate) fn release_scope(&mut self) {
        self.scope.release();
    }
}

impl fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateContext")
            .field("bot", &self.bot)
            .field("update_id", &self.update.id)
            .field("scope_released", &self.scope.is_released())
            .finish()
    }
}

/// Processing applied to every update.
///
/// # Example
///
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Pipeline for Echo {
///     async fn invoke(&self, ctx: &UpdateContext, _cancel: &CancellationToken) -> anyhow::Result<()> {
///         tracing::info!("update {} from {}", ctx.update().id, ctx.bot().name());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Processes one update. Should return promptly once `cancel` fires.
    async fn invoke(&self, ctx: &UpdateContext, cancel: &CancellationToken) -> Result<()>;
}

/// Builds the pipeline once, when the polling manager is constructed.
pub trait PipelineBuilder {
    fn build(&self) -> Result<Arc<dyn Pipeline>>;
}

/// Closure-backed pipeline.
///
/// ```rust,ignore
/// let pipeline = PipelineFn::arc(|ctx, _cancel| {
///     Box::pin(async move {
///         tracing::info!("got update {}", ctx.update().id);
///         Ok::<_, anyhow::Error>(())
///     })
/// });
/// ```
pub struct PipelineFn<F> {
    f: F,
}

impl<F> PipelineFn<F>
where
    F: for<'a> Fn(&'a UpdateContext, &'a CancellationToken) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F> Pipeline for PipelineFn<F>
where
    F: for<'a> Fn(&'a UpdateContext, &'a CancellationToken) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync
        + 'static,
{
    async fn invoke(&self, ctx: &UpdateContext, cancel: &CancellationToken) -> Result<()> {
        (self.f)(ctx, cancel).await
    }
}
