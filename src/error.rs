//! Error handling for the demodulator engine
//!
//! This module defines the crate-wide error type and a Result alias used by
//! the control surface, the coordinator and the front-end layer.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for demodulator engine operations
#[derive(Error, Debug)]
pub enum DemodError {
    /// Static configuration problems (missing descriptor, invalid settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A mode id outside the fixed registry
    #[error("Unknown mode id {0}")]
    UnknownMode(u32),

    /// Errors reported by the hardware front-end driver
    #[error("Front-end error: {0}")]
    FrontEnd(String),

    /// The processing pipeline is not running because of an earlier fault
    #[error("Processing stopped: {0}")]
    ProcessingStopped(String),

    /// Errors raised by the flowgraph itself
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DemodError>,
    },
}

impl DemodError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DemodError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error leaves the pipeline fully stopped.
    pub fn is_fatal(&self) -> bool {
        match self {
            DemodError::ProcessingStopped(_) | DemodError::Pipeline(_) => true,
            DemodError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for demodulator engine operations
pub type Result<T> = std::result::Result<T, DemodError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemodError::UnknownMode(42);
        assert_eq!(err.to_string(), "Unknown mode id 42");
    }

    #[test]
    fn test_error_with_context() {
        let err = DemodError::FrontEnd("tune failed".to_string());
        let with_ctx = err.with_context("Switching to WBFM");
        assert!(with_ctx.to_string().contains("Switching to WBFM"));
        assert!(with_ctx.to_string().contains("tune failed"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DemodError::ProcessingStopped("x".into()).is_fatal());
        assert!(DemodError::Pipeline(PipelineError::Faulted("x".into())).is_fatal());
        assert!(!DemodError::UnknownMode(99).is_fatal());
        let wrapped = DemodError::ProcessingStopped("x".into()).with_context("ctx");
        assert!(wrapped.is_fatal());
    }
}
