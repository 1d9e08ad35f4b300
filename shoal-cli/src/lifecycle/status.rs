//! Point-in-time status report, independent of any event stream.

use std::io::{self, Write};

use shoal_core::config::SystemConfig;
use shoal_core::engine::{Engine, StatusListing};
use shoal_core::{LifecycleError, Result};

use super::errors::TAB;
use crate::ui::Theme;

/// Outcome of a status query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusReport {
    NoSystemConfig,
    NoProject,
    NotSetUp,
    Services(StatusListing),
}

/// Ask the engine for the state of the loaded project.
///
/// Reports why nothing can be listed instead of a partial listing.
pub async fn snapshot(
    engine: &dyn Engine,
    system: Option<&SystemConfig>,
    project_is_set_up: bool,
    limit: Option<&[String]>,
) -> Result<StatusReport> {
    let Some(system) = system else {
        return Ok(StatusReport::NoSystemConfig);
    };
    let Some(project) = system.project.as_ref() else {
        return Ok(StatusReport::NoProject);
    };
    if !project_is_set_up {
        return Ok(StatusReport::NotSetUp);
    }

    let mut listing = engine
        .status_for(project, system)
        .await
        .map_err(|source| LifecycleError::operation("Error reading the service status", source))?;

    if let Some(limit) = limit {
        listing.retain(|(name, _)| limit.contains(name));
    }
    Ok(StatusReport::Services(listing))
}

pub fn render(report: &StatusReport, out: &mut impl Write, theme: &Theme) -> io::Result<()> {
    writeln!(out, "Status:")?;

    // Without a system configuration there is no project either
    let conditions: &[&str] = match report {
        StatusReport::NoSystemConfig => &["No system configuration found.", "No project found."],
        StatusReport::NoProject => &["No project found."],
        StatusReport::NotSetUp => &["Project is not yet set up. Run `shoal setup`."],
        StatusReport::Services(_) => &[],
    };
    if !conditions.is_empty() {
        for text in conditions {
            writeln!(out, "{}{}", TAB, theme.warning(text))?;
        }
        return out.flush();
    }

    if let StatusReport::Services(listing) = report {
        for (name, status) in listing {
            writeln!(out, "{}{}", TAB, theme.service_label(&format!("{}:", name), status.running))?;
            if !status.running {
                writeln!(out, "{TAB}{TAB}Not running.")?;
            } else {
                writeln!(out, "{TAB}{TAB}Running.")?;
                if let Some(web) = &status.web {
                    writeln!(out, "{TAB}{TAB}Access via {}", theme.emphasis(web))?;
                }
                if !status.additional_ports.is_empty() {
                    writeln!(out, "{TAB}{TAB}Additional Ports:")?;
                    for port in &status.additional_ports {
                        writeln!(
                            out,
                            "{TAB}{TAB}{TAB}{} ({}) reachable on localhost:{}",
                            theme.emphasis(&port.title),
                            port.container,
                            theme.emphasis(&port.host.to_string())
                        )?;
                    }
                }
            }
            writeln!(out)?;
        }
    }
    out.flush()
}
