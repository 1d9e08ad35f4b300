use std::path::PathBuf;

use thiserror::Error;

use shoal_core::LifecycleError;
use shoal_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Project configuration: {0}")]
    Project(#[from] ConfigError),

    #[error("System configuration {path}: {source}")]
    SystemConfig {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("Cannot determine the system configuration directory")]
    NoConfigDir,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// 2 for problems with what the user asked for or configured, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Project(_) | Self::SystemConfig { .. } | Self::NoConfigDir => 2,
            Self::Lifecycle(e) if e.is_config_error() => 2,
            Self::Lifecycle(_) | Self::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
