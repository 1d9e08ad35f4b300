use serde::{Deserialize, Serialize};

pub type ServiceName = String;

/// The two lifecycle operations that stream progress events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Stop,
}

impl LifecycleOp {
    /// Banner printed before the progress board is drawn
    pub fn banner(self) -> &'static str {
        match self {
            Self::Start => "Starting services...",
            Self::Stop => "Stopping services...",
        }
    }

    /// Present participle used in the error summary header
    pub fn verb(self) -> &'static str {
        match self {
            Self::Start => "starting",
            Self::Stop => "stopping",
        }
    }

    /// Context attached to a stream failure
    pub fn failure_context(self) -> &'static str {
        match self {
            Self::Start => "Error starting the services",
            Self::Stop => "Error stopping the services",
        }
    }
}

/// What the engine reports about a service in a single event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusPayload {
    /// Intermediate progress. `steps` is `None` until the engine knows the total.
    InProgress {
        text: String,
        current_step: u64,
        steps: Option<u64>,
    },
    /// The service failed. Only valid on a finished event.
    Failure { message: String },
    /// The service completed without further detail. Only valid on a finished event.
    Success,
}

/// One `(service, payload, finished)` tuple from an engine stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub service: ServiceName,
    pub payload: StatusPayload,
    pub finished: bool,
}

impl StatusEvent {
    pub fn progress(
        service: impl Into<ServiceName>,
        text: impl Into<String>,
        current_step: u64,
        steps: Option<u64>,
    ) -> Self {
        Self {
            service: service.into(),
            payload: StatusPayload::InProgress {
                text: text.into(),
                current_step,
                steps,
            },
            finished: false,
        }
    }

    pub fn failed(service: impl Into<ServiceName>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            payload: StatusPayload::Failure {
                message: message.into(),
            },
            finished: true,
        }
    }

    pub fn succeeded(service: impl Into<ServiceName>) -> Self {
        Self {
            service: service.into(),
            payload: StatusPayload::Success,
            finished: true,
        }
    }
}

/// A published port besides the main web port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub title: String,
    pub container: u16,
    pub host: u16,
}

/// Point-in-time running state of a service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    /// URL the service is reachable at, if it exposes a web port
    pub web: Option<String>,
    pub additional_ports: Vec<PortMapping>,
}

impl ServiceStatus {
    pub fn stopped() -> Self {
        Self::default()
    }
}
