//! Errors surfaced to the command layer by lifecycle operations.
//!
//! Per-service failures never show up here: they are reported inline and in
//! the error summary while the rest of the batch carries on. A
//! [`LifecycleError`] always means the operation as a whole did not complete.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The engine's event stream (or status query) failed
    #[error("{context}")]
    Operation {
        context: String,
        #[source]
        source: EngineError,
    },

    /// The requested service set is unusable. Raised before anything is drawn.
    #[error("invalid service selection: {message}")]
    Configuration { message: String },

    #[error("{context}: interrupted")]
    Interrupted { context: String },

    #[error("{context}: timed out after {}s", timeout.as_secs())]
    TimedOut { context: String, timeout: Duration },

    /// Writing to the terminal failed
    #[error("terminal output failed: {0}")]
    Terminal(#[from] std::io::Error),
}

impl LifecycleError {
    pub fn operation(context: impl Into<String>, source: EngineError) -> Self {
        Self::Operation {
            context: context.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if the problem lies in what the user asked for
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<ConfigError> for LifecycleError {
    fn from(e: ConfigError) -> Self {
        Self::configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_operation_error_keeps_source() {
        let err = LifecycleError::operation(
            "Error starting the services",
            EngineError::Task {
                message: "socket closed".into(),
            },
        );
        assert_eq!(err.to_string(), "Error starting the services");
        assert!(err.source().unwrap().to_string().contains("socket closed"));
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_unknown_service_becomes_configuration_error() {
        let err: LifecycleError = ConfigError::UnknownService {
            name: "cache".into(),
            available: vec!["web".into()],
        }
        .into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("cache"));
    }
}
