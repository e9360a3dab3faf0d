//! Error classification and reporting for pipeline threads.

use std::fmt;

/// Errors raised by pipeline threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline keeps running: an engine call failed, a segment was
    /// dropped, a queue overflowed.
    Recoverable(String),
    /// The pipeline cannot continue: the capture device is gone.
    Fatal(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            PipelineError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Trait for reporting pipeline errors to the operator.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from the named pipeline component.
    fn report(&self, component: &str, error: &PipelineError);
}

/// Default reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, error: &PipelineError) {
        eprintln!("subcast [{}] {}", component, error);
    }
}
