use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::config::{ProjectConfig, SystemConfig};
use crate::model::{ServiceName, ServiceStatus, StatusEvent};

/// Failures raised by the engine itself, as opposed to a single service failing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("service not found: {name}")]
    ServiceNotFound { name: ServiceName },

    #[error("engine state unavailable at {path}: {source}")]
    State {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine state is corrupt: {message}")]
    CorruptState { message: String },

    #[error("engine task failed: {message}")]
    Task { message: String },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: String },
}

/// Ordered stream of lifecycle events. An `Err` item aborts the whole operation.
pub type EventStream = BoxStream<'static, Result<StatusEvent, EngineError>>;

/// Ordered `(service, status)` listing, in project declaration order.
pub type StatusListing = Vec<(ServiceName, ServiceStatus)>;

/// The Engine trait is the pluggable backend that actually starts and stops services.
///
/// Engines are free to work on several services at once, but every update
/// has to be funnelled through the single stream returned by
/// [`Engine::start_project`] / [`Engine::stop_project`]. Each requested
/// service receives exactly one event with `finished == true`.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Get the name of this engine implementation
    fn name(&self) -> &'static str;

    /// Start `services` of `project`, streaming progress as it happens.
    fn start_project(&self, project: &ProjectConfig, services: &[ServiceName]) -> EventStream;

    /// Stop `services` of `project`, streaming progress as it happens.
    fn stop_project(&self, project: &ProjectConfig, services: &[ServiceName]) -> EventStream;

    /// Read the current state of every service of `project`. Must not change anything.
    async fn status_for(
        &self,
        project: &ProjectConfig,
        system: &SystemConfig,
    ) -> Result<StatusListing, EngineError>;
}
