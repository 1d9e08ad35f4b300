use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use shoal_core::config::{ProjectConfig, ServiceConfig, SystemConfig};
use shoal_core::engine::{Engine, EngineError, EventStream, StatusListing};
use shoal_core::model::{LifecycleOp, PortMapping, ServiceName, ServiceStatus, StatusEvent};

const START_STEPS: [&str; 4] = [
    "Checking image",
    "Creating container",
    "Starting container",
    "Waiting for service",
];
const STOP_STEPS: [&str; 2] = ["Stopping container", "Removing container"];

const STATE_FILE: &str = "state.json";
const HOST_PORT_BASE: u16 = 30000;

type Item = Result<StatusEvent, EngineError>;

/// Simulates service lifecycles for demos and testing.
///
/// Each service runs in its own task and walks through a fixed list of steps.
/// Which services are running is kept in `<project dir>/.shoal/state.json`,
/// so `start`, `status` and `stop` agree across invocations.
pub struct SimulatedEngine {
    step_delay: Duration,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            step_delay: Duration::from_millis(250),
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    fn run_operation(&self, op: LifecycleOp, project: &ProjectConfig, services: &[ServiceName]) -> EventStream {
        let (tx, rx) = mpsc::channel::<Item>(64);
        let project = project.clone();
        let services = services.to_vec();
        let delay = self.step_delay;

        tokio::spawn(async move {
            if let Err(e) = drive_services(op, project, services, delay, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for SimulatedEngine {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn start_project(&self, project: &ProjectConfig, services: &[ServiceName]) -> EventStream {
        self.run_operation(LifecycleOp::Start, project, services)
    }

    fn stop_project(&self, project: &ProjectConfig, services: &[ServiceName]) -> EventStream {
        self.run_operation(LifecycleOp::Stop, project, services)
    }

    async fn status_for(
        &self,
        project: &ProjectConfig,
        system: &SystemConfig,
    ) -> Result<StatusListing, EngineError> {
        let state = EngineState::load(&EngineState::path(project)?).await?;

        Ok(project
            .services
            .iter()
            .enumerate()
            .map(|(index, service)| {
                let status = if state.running.contains(&service.name) {
                    ServiceStatus {
                        running: true,
                        web: web_endpoint(project, service, system),
                        additional_ports: host_ports(index, service),
                    }
                } else {
                    ServiceStatus::stopped()
                };
                (service.name.clone(), status)
            })
            .collect())
    }
}

/// Which services are up, persisted between invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct EngineState {
    running: BTreeSet<ServiceName>,
}

impl EngineState {
    fn path(project: &ProjectConfig) -> Result<PathBuf, EngineError> {
        project
            .state_dir()
            .map(|dir| dir.join(STATE_FILE))
            .ok_or_else(|| EngineError::NotSupported {
                operation: "projects that were not loaded from a file".into(),
            })
    }

    async fn load(path: &Path) -> Result<Self, EngineError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| EngineError::CorruptState {
                message: format!("{}: {}", path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(EngineError::State {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn save(&self, path: &Path) -> Result<(), EngineError> {
        let io_err = |source| EngineError::State {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| EngineError::CorruptState {
            message: e.to_string(),
        })?;

        // Write atomically via temp file + rename
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(io_err)
    }
}

async fn drive_services(
    op: LifecycleOp,
    project: ProjectConfig,
    services: Vec<ServiceName>,
    delay: Duration,
    tx: mpsc::Sender<Item>,
) -> Result<(), EngineError> {
    let path = EngineState::path(&project)?;
    let mut state = EngineState::load(&path).await?;

    let mut tasks = JoinSet::new();
    for name in services {
        let service = project
            .service(&name)
            .cloned()
            .ok_or(EngineError::ServiceNotFound { name: name.clone() })?;
        let was_running = state.running.contains(&name);
        tasks.spawn(simulate_service(op, service, was_running, delay, tx.clone()));
    }

    while let Some(joined) = tasks.join_next().await {
        let (name, running) = joined.map_err(|e| EngineError::Task {
            message: e.to_string(),
        })?;
        if running {
            state.running.insert(name);
        } else {
            state.running.remove(&name);
        }
    }

    state.save(&path).await
}

/// Returns false once nobody is listening anymore
async fn emit(tx: &mpsc::Sender<Item>, event: StatusEvent) -> bool {
    tx.send(Ok(event)).await.is_ok()
}

/// Walk one service through its steps. Returns whether it ends up running.
async fn simulate_service(
    op: LifecycleOp,
    service: ServiceConfig,
    was_running: bool,
    delay: Duration,
    tx: mpsc::Sender<Item>,
) -> (ServiceName, bool) {
    let name = service.name.clone();

    let (steps, done_text, ends_running): (&[&str], &str, bool) = match op {
        LifecycleOp::Start => (START_STEPS.as_slice(), "Started", true),
        LifecycleOp::Stop => (STOP_STEPS.as_slice(), "Stopped", false),
    };

    if was_running == ends_running {
        let text = if ends_running { "Already running" } else { "Not running" };
        if emit(&tx, StatusEvent::progress(&name, text, 1, Some(1))).await {
            emit(&tx, StatusEvent::succeeded(&name)).await;
        }
        return (name, was_running);
    }

    let total = steps.len() as u64;
    for (i, text) in steps.iter().enumerate() {
        if !emit(&tx, StatusEvent::progress(&name, *text, i as u64, Some(total))).await {
            return (name, was_running);
        }
        tokio::time::sleep(delay).await;

        if op == LifecycleOp::Start && i == 0 && service.image.is_none() {
            debug!(service = %name, "no image configured");
            emit(
                &tx,
                StatusEvent::failed(&name, format!("no image configured for service '{}'", name)),
            )
            .await;
            return (name, false);
        }
    }

    if emit(&tx, StatusEvent::progress(&name, done_text, total, Some(total))).await {
        emit(&tx, StatusEvent::succeeded(&name)).await;
    }
    (name, ends_running)
}

fn web_endpoint(project: &ProjectConfig, service: &ServiceConfig, system: &SystemConfig) -> Option<String> {
    service.port?;
    let proxy = system.proxy.as_ref()?;
    let host = format!("{}--{}.{}", project.name, service.name, proxy.url);
    if proxy.port == 80 {
        Some(format!("http://{}", host))
    } else {
        Some(format!("http://{}:{}", host, proxy.port))
    }
}

/// Deterministic host ports: ten per service, in declaration order
fn host_ports(index: usize, service: &ServiceConfig) -> Vec<PortMapping> {
    service
        .additional_ports
        .iter()
        .enumerate()
        .map(|(j, port)| {
            let offset = u16::try_from(index * 10 + j + 1).unwrap_or(u16::MAX);
            PortMapping {
                title: port.title.clone(),
                container: port.container,
                host: HOST_PORT_BASE.saturating_add(offset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use shoal_core::model::StatusPayload;

    const PROJECT: &str = r#"
name: shop
services:
  web:
    image: nginx
    port: 80
    additional_ports:
      - title: Debug
        container: 9000
  db:
    image: postgres
  worker:
"#;

    fn project(dir: &Path) -> ProjectConfig {
        let path = dir.join("shoal.yml");
        std::fs::write(&path, PROJECT).unwrap();
        ProjectConfig::load(&path).unwrap()
    }

    fn engine() -> SimulatedEngine {
        SimulatedEngine::new().with_step_delay(Duration::ZERO)
    }

    fn names(list: &[&str]) -> Vec<ServiceName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn collect(stream: EventStream) -> Vec<StatusEvent> {
        stream
            .map(|item| item.expect("stream should not fail"))
            .collect()
            .await
    }

    fn events_for<'a>(events: &'a [StatusEvent], service: &str) -> Vec<&'a StatusEvent> {
        events.iter().filter(|e| e.service == service).collect()
    }

    #[tokio::test]
    async fn test_start_emits_monotonic_progress_then_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        let events = collect(engine().start_project(&project, &names(&["web", "db"]))).await;

        for service in ["web", "db"] {
            let per_service = events_for(&events, service);
            let last = per_service.last().unwrap();
            assert_eq!(last.payload, StatusPayload::Success);
            assert!(last.finished);
            assert_eq!(per_service.iter().filter(|e| e.finished).count(), 1);

            let steps: Vec<u64> = per_service
                .iter()
                .filter_map(|e| match &e.payload {
                    StatusPayload::InProgress { current_step, .. } => Some(*current_step),
                    _ => None,
                })
                .collect();
            assert_eq!(steps, vec![0, 1, 2, 3, 4]);
        }
    }

    #[tokio::test]
    async fn test_service_without_image_fails_without_stopping_others() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        let engine = engine();

        let events = collect(engine.start_project(&project, &names(&["worker", "db"]))).await;

        let worker = events_for(&events, "worker");
        assert_eq!(
            worker.last().unwrap().payload,
            StatusPayload::Failure {
                message: "no image configured for service 'worker'".into()
            }
        );
        assert_eq!(
            events_for(&events, "db").last().unwrap().payload,
            StatusPayload::Success
        );

        let listing = engine
            .status_for(&project, &SystemConfig::default())
            .await
            .unwrap();
        let running: Vec<_> = listing
            .iter()
            .filter(|(_, s)| s.running)
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(running, vec!["db"]);
    }

    #[tokio::test]
    async fn test_status_reports_endpoint_and_ports_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        let engine = engine();
        let system = SystemConfig::from_str("proxy:\n  url: shoal.local\n  port: 8080\n").unwrap();

        collect(engine.start_project(&project, &names(&["web"]))).await;
        let listing = engine.status_for(&project, &system).await.unwrap();

        assert_eq!(listing[0].0, "web");
        let web = &listing[0].1;
        assert!(web.running);
        assert_eq!(web.web.as_deref(), Some("http://shop--web.shoal.local:8080"));
        assert_eq!(
            web.additional_ports,
            vec![PortMapping {
                title: "Debug".into(),
                container: 9000,
                host: 30001,
            }]
        );
        assert_eq!(listing[1].1, ServiceStatus::stopped());
    }

    #[tokio::test]
    async fn test_stop_after_start_clears_running_state() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        let engine = engine();

        collect(engine.start_project(&project, &names(&["web", "db"]))).await;
        let events = collect(engine.stop_project(&project, &names(&["web"]))).await;
        assert_eq!(events_for(&events, "web").len(), 4);

        let listing = engine
            .status_for(&project, &SystemConfig::default())
            .await
            .unwrap();
        assert!(!listing[0].1.running);
        assert!(listing[1].1.running);

        // stopping again is a quick no-op
        let events = collect(engine.stop_project(&project, &names(&["web"]))).await;
        assert_eq!(
            events[0],
            StatusEvent::progress("web", "Not running", 1, Some(1))
        );
    }

    #[tokio::test]
    async fn test_unknown_service_breaks_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());

        let items: Vec<Item> = engine()
            .start_project(&project, &names(&["queue"]))
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(EngineError::ServiceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(dir.path());
        let state_dir = dir.path().join(".shoal");
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join(STATE_FILE), "not json").unwrap();

        let result = engine()
            .status_for(&project, &SystemConfig::default())
            .await;
        assert!(matches!(result, Err(EngineError::CorruptState { .. })));
    }
}
