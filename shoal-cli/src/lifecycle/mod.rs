//! Start/stop progress pipeline and the status report.
//!
//! An operation prints a banner, draws one widget per service, feeds the
//! engine's event stream through [`dispatch::drive`], then always closes the
//! board and prints the error summary before reporting how it ended.

pub mod board;
pub mod console;
pub mod dispatch;
pub mod errors;
pub mod geometry;
pub mod interrupt;
pub mod render;
pub mod status;

use std::io::Write;
use std::time::Duration;

use tracing::{info, warn};

use shoal_core::config::{ProjectConfig, SystemConfig};
use shoal_core::engine::{Engine, EventStream};
use shoal_core::model::{LifecycleOp, ServiceName};
use shoal_core::{LifecycleError, Result};

use board::Board;
use console::{Console, RenderMode};
use errors::ErrorLog;
use interrupt::Interrupt;

pub struct Lifecycle<'a> {
    engine: &'a dyn Engine,
    system: Option<&'a SystemConfig>,
    project_is_set_up: bool,
    timeout: Option<Duration>,
    interrupt: Interrupt,
}

impl<'a> Lifecycle<'a> {
    pub fn new(engine: &'a dyn Engine, system: Option<&'a SystemConfig>, project_is_set_up: bool) -> Self {
        Self {
            engine,
            system,
            project_is_set_up,
            timeout: None,
            interrupt: Interrupt::never(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start `services` (all services when `None`), then optionally show the status.
    pub async fn start_project<W: Write>(
        &self,
        console: &mut Console<W>,
        services: Option<Vec<String>>,
        show_status: bool,
    ) -> Result<()> {
        self.run(LifecycleOp::Start, console, services, show_status).await
    }

    /// Stop `services` (all services when `None`), then optionally show the status.
    pub async fn stop_project<W: Write>(
        &self,
        console: &mut Console<W>,
        services: Option<Vec<String>>,
        show_status: bool,
    ) -> Result<()> {
        self.run(LifecycleOp::Stop, console, services, show_status).await
    }

    /// Stop then start the same services; the status is shown once at the end.
    pub async fn restart_project<W: Write>(
        &self,
        console: &mut Console<W>,
        services: Option<Vec<String>>,
        show_status: bool,
    ) -> Result<()> {
        self.run(LifecycleOp::Stop, console, services.clone(), false)
            .await?;
        self.run(LifecycleOp::Start, console, services, show_status)
            .await
    }

    pub async fn status_project<W: Write>(
        &self,
        console: &mut Console<W>,
        limit: Option<&[String]>,
    ) -> Result<()> {
        let snapshot = status::snapshot(self.engine, self.system, self.project_is_set_up, limit);
        let report = tokio::select! {
            report = snapshot => report?,
            _ = self.interrupt.wait() => {
                return Err(LifecycleError::Interrupted {
                    context: "Error reading the service status".into(),
                });
            }
        };
        let theme = console.theme();
        status::render(&report, console, &theme)?;
        Ok(())
    }

    fn project(&self) -> Result<&'a ProjectConfig> {
        let system = self
            .system
            .ok_or_else(|| LifecycleError::configuration("no system configuration found"))?;
        system
            .project
            .as_ref()
            .ok_or_else(|| LifecycleError::configuration("no project loaded"))
    }

    async fn run<W: Write>(
        &self,
        op: LifecycleOp,
        console: &mut Console<W>,
        services: Option<Vec<String>>,
        show_status: bool,
    ) -> Result<()> {
        let project = self.project()?;
        let services = project.resolve_services(services)?;
        board::check_names(&services)?;

        info!(?op, engine = self.engine.name(), ?services, "lifecycle operation");
        writeln!(console, "{}", op.banner())?;
        writeln!(console)?;

        let mut errors = ErrorLog::new(op);
        let outcome = {
            let mut board = Board::build(&services, console)?;
            // Log lines on the terminal would shift the rows being redrawn
            let held_logs = (board.mode() == RenderMode::Live).then(crate::logging::hold);
            let events = match op {
                LifecycleOp::Start => self.engine.start_project(project, &services),
                LifecycleOp::Stop => self.engine.stop_project(project, &services),
            };
            let outcome = self.drive_guarded(op, events, &mut board, &mut errors).await;
            board.close_all()?;
            drop(held_logs);
            outcome
        };
        if let Err(e @ (LifecycleError::Interrupted { .. } | LifecycleError::TimedOut { .. })) = &outcome {
            warn!(?op, error = %e, "operation aborted");
        }

        let theme = console.theme();
        errors.render_summary(console, &theme)?;
        outcome?;

        info!(?op, failed = errors.records().len(), "lifecycle operation finished");
        if show_status {
            self.status_project(console, None).await?;
        }
        Ok(())
    }

    /// Drive the stream until it ends, the interrupt fires or the timeout elapses.
    async fn drive_guarded<W: Write>(
        &self,
        op: LifecycleOp,
        events: EventStream,
        board: &mut Board<'_, W>,
        errors: &mut ErrorLog,
    ) -> Result<()> {
        let context = op.failure_context().to_string();

        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            outcome = dispatch::drive(op, events, board, errors) => outcome,
            _ = self.interrupt.wait() => Err(LifecycleError::Interrupted { context }),
            _ = deadline => {
                Err(LifecycleError::TimedOut {
                    context,
                    timeout: self.timeout.unwrap_or_default(),
                })
            }
        }
    }
}
