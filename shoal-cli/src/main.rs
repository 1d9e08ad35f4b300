mod engines;
mod errors;
mod lifecycle;
mod logging;
mod ui;

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use shoal_core::config::{ConfigError, ProjectConfig, SystemConfig};

use engines::SimulatedEngine;
use errors::{CliError, Result};
use lifecycle::Lifecycle;
use lifecycle::console::{Console, RenderMode};
use lifecycle::interrupt::Interrupt;
use ui::Theme;

const SYSTEM_CONFIG_FILE: &str = "config.yml";

const DEFAULT_SYSTEM_CONFIG: &str = "\
proxy:
  url: shoal.local
  port: 80
engine:
  step_delay_ms: 250
";

#[derive(Parser, Debug)]
#[command(name = "shoal")]
#[command(version, about = "Start, stop and inspect the services of a local project", long_about = None)]
struct Cli {
    /// Project file (default: searched from the working directory upwards)
    #[arg(short = 'f', long = "file", global = true)]
    file: Option<PathBuf>,

    /// System configuration file (default: <config dir>/shoal/config.yml)
    #[arg(long, env = "SHOAL_SYSTEM_CONFIG", global = true)]
    system_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print one line per update instead of redrawing in place
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start services (all of them when none are named)
    Start {
        services: Vec<String>,
        /// Skip the status report afterwards
        #[arg(long)]
        no_status: bool,
        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Stop services (all of them when none are named)
    Stop {
        services: Vec<String>,
        #[arg(long)]
        no_status: bool,
    },
    /// Stop, then start services again
    Restart {
        services: Vec<String>,
        #[arg(long)]
        no_status: bool,
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Show which services are running and how to reach them
    Status { services: Vec<String> },
    /// Mark the project as set up and write a default system configuration if there is none
    Setup,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let system_path = system_config_path(cli.system_config.as_deref())?;

    if let Commands::Setup = cli.command {
        return setup(cli.file.as_deref(), &system_path);
    }

    let project = load_project(cli.file.as_deref())?;
    let project_is_set_up = project.as_ref().is_some_and(ProjectConfig::is_set_up);
    let system = load_system_config(&system_path)?.map(|system| match project {
        Some(project) => system.with_project(project),
        None => system,
    });

    let settings = system
        .as_ref()
        .map(|system| system.engine.clone())
        .unwrap_or_default();
    let engine = SimulatedEngine::new().with_step_delay(Duration::from_millis(settings.step_delay_ms));

    let mode = if cli.plain {
        RenderMode::Plain
    } else {
        RenderMode::detect()
    };
    let mut console = Console::stdout(Theme::detect(), mode);
    let lifecycle =
        Lifecycle::new(&engine, system.as_ref(), project_is_set_up).with_interrupt(Interrupt::ctrl_c());

    match cli.command {
        Commands::Start {
            services,
            no_status,
            timeout,
        } => {
            lifecycle
                .with_timeout(timeout.map(Duration::from_secs))
                .start_project(&mut console, selection(services), !no_status)
                .await?
        }
        Commands::Stop {
            services,
            no_status,
        } => {
            lifecycle
                .stop_project(&mut console, selection(services), !no_status)
                .await?
        }
        Commands::Restart {
            services,
            no_status,
            timeout,
        } => {
            lifecycle
                .with_timeout(timeout.map(Duration::from_secs))
                .restart_project(&mut console, selection(services), !no_status)
                .await?
        }
        Commands::Status { services } => {
            lifecycle
                .status_project(&mut console, selection(services).as_deref())
                .await?
        }
        // handled before anything was loaded
        Commands::Setup => {}
    }

    Ok(())
}

/// Print the error and whatever caused it, skipping causes already in the message
fn report(err: &CliError) {
    let message = err.to_string();
    eprintln!("Error: {}", message);

    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            eprintln!("  Caused by: {}", text);
        }
        source = cause.source();
    }
}

/// An empty service list means "all services"
fn selection(services: Vec<String>) -> Option<Vec<String>> {
    if services.is_empty() {
        None
    } else {
        Some(services)
    }
}

fn system_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join("shoal").join(SYSTEM_CONFIG_FILE))
            .ok_or(CliError::NoConfigDir),
    }
}

fn find_project(file: Option<&Path>) -> Result<ProjectConfig> {
    let project = match file {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::discover(&std::env::current_dir()?)?,
    };
    debug!(project = %project.name, path = ?project.path, "loaded project");
    Ok(project)
}

/// Like [`find_project`], but no project file at all is not an error
fn load_project(file: Option<&Path>) -> Result<Option<ProjectConfig>> {
    match find_project(file) {
        Ok(project) => Ok(Some(project)),
        Err(CliError::Project(ConfigError::NotFound { .. })) => {
            debug!("no project file found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn load_system_config(path: &Path) -> Result<Option<SystemConfig>> {
    if !path.exists() {
        debug!(path = %path.display(), "no system configuration");
        return Ok(None);
    }
    SystemConfig::load(path)
        .map(Some)
        .map_err(|source| CliError::SystemConfig {
            path: path.to_path_buf(),
            source,
        })
}

fn setup(file: Option<&Path>, system_path: &Path) -> Result<()> {
    let project = find_project(file)?;

    if !system_path.exists() {
        if let Some(dir) = system_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(system_path, DEFAULT_SYSTEM_CONFIG)?;
        println!("Wrote default system configuration to {}", system_path.display());
    }

    let marker = project.mark_set_up()?;
    info!(marker = %marker.display(), "project set up");
    println!("Project '{}' is set up.", project.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_with_flags() {
        let cli = Cli::try_parse_from([
            "shoal", "--plain", "start", "web", "db", "--no-status", "--timeout", "30",
        ])
        .unwrap();
        assert!(cli.plain);
        match cli.command {
            Commands::Start {
                services,
                no_status,
                timeout,
            } => {
                assert_eq!(services, vec!["web", "db"]);
                assert!(no_status);
                assert_eq!(timeout, Some(30));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_file_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["shoal", "status", "-f", "other/shoal.yml"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("other/shoal.yml")));
    }

    #[test]
    fn test_empty_selection_means_all() {
        assert_eq!(selection(Vec::new()), None);
        assert_eq!(selection(vec!["web".into()]), Some(vec!["web".to_string()]));
    }

    #[test]
    fn test_missing_system_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_system_config(&dir.path().join("config.yml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_broken_system_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "proxy: [unclosed").unwrap();

        let err = load_system_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.yml"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_default_system_config_parses() {
        let system = SystemConfig::from_str(DEFAULT_SYSTEM_CONFIG).unwrap();
        assert_eq!(system.proxy.unwrap().url, "shoal.local");
        assert_eq!(system.engine.step_delay_ms, 250);
    }

    #[test]
    fn test_setup_writes_marker_and_system_config() {
        let dir = tempfile::tempdir().unwrap();
        let project_file = dir.path().join("shoal.yml");
        std::fs::write(&project_file, "name: shop\nservices:\n  web: {}\n").unwrap();
        let system_path = dir.path().join("conf").join("config.yml");

        setup(Some(&project_file), &system_path).unwrap();

        assert!(system_path.exists());
        let project = load_project(Some(&project_file)).unwrap().unwrap();
        assert!(project.is_set_up());
    }

    #[test]
    fn test_explicit_missing_project_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_project(Some(&dir.path().join("nope.yml"))).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
