//! Error reporting sink for failures the loop absorbs.

use std::error::Error;
use std::fmt;

/// Where a reported error was contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportContext {
    /// A startup step failed; the run is over.
    Startup,
    /// A fetch attempt failed and will be retried.
    Fetch { attempt: u32 },
    /// The execution scope for an update could not be created; the run is over.
    Scope { update_id: i64 },
    /// The pipeline failed or panicked for an update.
    Pipeline { update_id: i64 },
    /// Anything else escaping one loop iteration.
    Iteration,
}

impl fmt::Display for ReportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportContext::Startup => f.write_str("update polling manager error"),
            ReportContext::Fetch { attempt } => write!(f, "fetch attempt {attempt} failed"),
            ReportContext::Scope { update_id } => {
                write!(f, "scope creation failed for update {update_id}")
            }
            ReportContext::Pipeline { update_id } => {
                write!(f, "pipeline failed for update {update_id}")
            }
            ReportContext::Iteration => f.write_str("error while polling updates"),
        }
    }
}

/// Receives the errors the polling loop contains.
///
/// Fire and forget: implementations must not panic and should not block.
pub trait Reporter: Send + Sync {
    fn report_error(&self, context: ReportContext, error: &(dyn Error + 'static));
}

/// Renders an error followed by its sources, `outer: inner: root`.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Default reporter writing to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report_error(&self, context: ReportContext, error: &(dyn Error + 'static)) {
        match context {
            ReportContext::Fetch { attempt } => tracing::warn!(
                target: "botpoll::polling",
                attempt,
                error = %error_chain(error),
                "{context}"
            ),
            _ => tracing::error!(
                target: "botpoll::polling",
                error = %error_chain(error),
                "{context}"
            ),
        }
    }
}
