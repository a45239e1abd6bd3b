//! Per-update execution scopes.
//!
//! Every update gets a fresh scope holding whatever per-update dependencies
//! the pipeline needs. [`ScopeGuard`] releases it exactly once, either
//! explicitly after the pipeline returns or on drop when unwinding.

use std::any::Any;

use anyhow::Result;

/// Resource lifetime boundary around one pipeline invocation.
pub trait ExecutionScope: Send + Sync {
    /// Frees the resources held by the scope. Called exactly once.
    fn release(&mut self);

    /// Downcast to Any so pipelines can reach their concrete scope type.
    fn as_any(&self) -> &dyn Any;
}

/// Creates a new scope per update.
pub trait ScopeFactory: Send + Sync {
    /// Must report failures instead of handing out a half-built scope.
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>>;
}

/// Scope without any dependencies.
#[derive(Debug, Default)]
pub struct EmptyScope;

impl ExecutionScope for EmptyScope {
    fn release(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for pipelines that need no per-update dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyScopeFactory;

impl ScopeFactory for EmptyScopeFactory {
    fn create_scope(&self) -> Result<Box<dyn ExecutionScope>> {
        Ok(Box::new(EmptyScope))
    }
}

/// Owns a scope and guarantees a single release.
pub struct ScopeGuard {
    scope: Box<dyn ExecutionScope>,
    released: bool,
}

impl ScopeGuard {
    pub fn new(scope: Box<dyn ExecutionScope>) -> Self {
        Self {
            scope,
            released: false,
        }
    }

    pub fn scope(&self) -> &dyn ExecutionScope {
        self.scope.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases the scope. Later calls, including the one from `Drop`, are no-ops.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.scope.release();
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.release();
    }
}
