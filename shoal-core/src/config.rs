use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::model::ServiceName;

/// Directory next to the project file that holds local state
pub const STATE_DIR: &str = ".shoal";

/// Marker written once the project has been set up
pub const SETUP_MARKER: &str = "setup-complete";

const PROJECT_FILE_NAMES: [&str; 4] = ["shoal.yml", "shoal.yaml", ".shoal.yml", ".shoal.yaml"];

/// A published port besides the main web port
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AdditionalPortConfig {
    /// Human readable name shown in the status report
    pub title: String,
    /// Port inside the container
    pub container: u16,
}

/// Service definition in the project file
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServiceConfig {
    /// Key of the service in the `services` map
    #[serde(skip)]
    pub name: ServiceName,

    /// Image to run. Services without one cannot be started.
    #[serde(default)]
    pub image: Option<String>,

    /// Port the service serves HTTP on, exposed through the proxy
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub additional_ports: Vec<AdditionalPortConfig>,
}

/// Root project file structure
#[derive(Clone, Debug, Deserialize)]
pub struct ProjectConfig {
    /// Config file version
    #[serde(default = "default_version")]
    pub version: String,

    /// Project name
    pub name: String,

    /// Service definitions, in declaration order
    #[serde(default, deserialize_with = "ordered_services")]
    pub services: Vec<ServiceConfig>,

    /// File this project was loaded from
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// Project file versions this build understands
const SUPPORTED_VERSIONS: &[&str] = &["1"];

fn default_version() -> String {
    SUPPORTED_VERSIONS[0].into()
}

/// Keeps the YAML mapping order, which drives display order.
fn ordered_services<'de, D>(deserializer: D) -> Result<Vec<ServiceConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ServicesVisitor;

    impl<'de> Visitor<'de> for ServicesVisitor {
        type Value = Vec<ServiceConfig>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of service name to service definition")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut services: Vec<ServiceConfig> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, service)) = map.next_entry::<String, Option<ServiceConfig>>()? {
                if services.iter().any(|s| s.name == name) {
                    return Err(de::Error::custom(format!("duplicate service '{}'", name)));
                }
                let mut service = service.unwrap_or_default();
                service.name = name;
                services.push(service);
            }
            Ok(services)
        }
    }

    deserializer.deserialize_map(ServicesVisitor)
}

/// Reverse proxy that fronts the web ports of all projects
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    /// Base domain, e.g. `shoal.local`
    pub url: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

fn default_proxy_port() -> u16 {
    80
}

/// Tuning for the bundled engine
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    /// Pause between simulated steps
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,
}

fn default_step_delay() -> u64 {
    250
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay(),
        }
    }
}

/// Per-user configuration, plus the project loaded for this invocation
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub engine: EngineSettings,

    /// Project discovered from the working directory, if any
    #[serde(skip)]
    pub project: Option<ProjectConfig>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported project file version '{version}'")]
    UnsupportedVersion { version: String },

    #[error("project name must not be empty")]
    MissingName,

    #[error("service '{service}' declares additional port '{title}' twice")]
    DuplicatePort { service: String, title: String },

    #[error("unknown service '{name}'. Available: {}", available.join(", "))]
    UnknownService { name: String, available: Vec<String> },

    #[error("no project file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("project was not loaded from a file")]
    NoProjectDir,
}

impl ProjectConfig {
    /// Load a project from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load a project from a string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProjectConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search for a project file in standard locations
    pub fn discover(start_dir: &Path) -> Result<Self, ConfigError> {
        let mut searched = Vec::new();

        // Check environment variable first
        if let Ok(env_path) = std::env::var("SHOAL_PROJECT") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Self::load(&path);
            }
            searched.push(path);
        }

        // Search current directory and parents
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &PROJECT_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(ConfigError::UnsupportedVersion {
                version: self.version.clone(),
            });
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }

        for svc in &self.services {
            for (i, port) in svc.additional_ports.iter().enumerate() {
                if svc.additional_ports[..i].iter().any(|p| p.title == port.title) {
                    return Err(ConfigError::DuplicatePort {
                        service: svc.name.clone(),
                        title: port.title.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// All service names in declaration order
    pub fn service_names(&self) -> Vec<ServiceName> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Turn an optional user selection into the list of services to operate on.
    ///
    /// `None` selects every service in declaration order. Unknown names are rejected.
    pub fn resolve_services(
        &self,
        requested: Option<Vec<String>>,
    ) -> Result<Vec<ServiceName>, ConfigError> {
        let Some(requested) = requested else {
            return Ok(self.service_names());
        };

        for name in &requested {
            if self.service(name).is_none() {
                return Err(ConfigError::UnknownService {
                    name: name.clone(),
                    available: self.service_names(),
                });
            }
        }
        Ok(requested)
    }

    /// Directory holding the project file
    pub fn project_dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// Local state directory of this project (`<project dir>/.shoal`)
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.project_dir().map(|dir| dir.join(STATE_DIR))
    }

    pub fn is_set_up(&self) -> bool {
        self.state_dir()
            .map(|dir| dir.join(SETUP_MARKER).exists())
            .unwrap_or(false)
    }

    /// Record that setup finished. Returns the marker path.
    pub fn mark_set_up(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.state_dir().ok_or(ConfigError::NoProjectDir)?;
        std::fs::create_dir_all(&dir)?;
        let marker = dir.join(SETUP_MARKER);
        std::fs::write(&marker, b"")?;
        Ok(marker)
    }
}

impl SystemConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid, all-defaults configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.project = Some(project);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_project() {
        let yaml = r#"
version: "1"
name: shop
services:
  web:
    image: nginx:1.27
    port: 80
  db:
    image: postgres:16
    additional_ports:
      - title: Postgres
        container: 5432
"#;
        let config = ProjectConfig::from_str(yaml).unwrap();
        assert_eq!(config.name, "shop");
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.service("db").unwrap().additional_ports[0].container, 5432);
        assert!(config.path.is_none());
    }

    #[test]
    fn test_services_keep_declaration_order() {
        let yaml = r#"
name: ordered
services:
  zeta:
    image: a
  alpha:
    image: b
  mid:
"#;
        let config = ProjectConfig::from_str(yaml).unwrap();
        assert_eq!(config.service_names(), vec!["zeta", "alpha", "mid"]);
        assert!(config.service("mid").unwrap().image.is_none());
    }

    #[test]
    fn test_duplicate_additional_port_title() {
        let yaml = r#"
name: dup
services:
  api:
    additional_ports:
      - title: debug
        container: 9000
      - title: debug
        container: 9001
"#;
        let result = ProjectConfig::from_str(yaml);
        assert!(matches!(result, Err(ConfigError::DuplicatePort { .. })));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let result = ProjectConfig::from_str("version: \"2\"\nname: shop\nservices: {}\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { version }) if version == "2"
        ));

        let config = ProjectConfig::from_str("name: shop\nservices: {}\n").unwrap();
        assert_eq!(config.version, "1");
    }

    #[test]
    fn test_extra_service_keys_are_ignored() {
        let yaml = r#"
name: shop
services:
  web:
    image: nginx:1.27
    description: storefront
"#;
        let config = ProjectConfig::from_str(yaml).unwrap();
        assert_eq!(config.services[0].image.as_deref(), Some("nginx:1.27"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = ProjectConfig::from_str("name: \"  \"\nservices: {}\n");
        assert!(matches!(result, Err(ConfigError::MissingName)));
    }

    #[test]
    fn test_resolve_services() {
        let config =
            ProjectConfig::from_str("name: p\nservices:\n  web: {}\n  db: {}\n").unwrap();

        assert_eq!(config.resolve_services(None).unwrap(), vec!["web", "db"]);
        assert_eq!(
            config.resolve_services(Some(vec!["db".into()])).unwrap(),
            vec!["db"]
        );

        let err = config
            .resolve_services(Some(vec!["cache".into()]))
            .unwrap_err();
        assert!(err.to_string().contains("cache"));
        assert!(err.to_string().contains("web, db"));
    }

    #[test]
    fn test_setup_marker_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shoal.yml");
        std::fs::write(&path, "name: p\nservices:\n  web: {}\n").unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert!(!config.is_set_up());
        config.mark_set_up().unwrap();
        assert!(config.is_set_up());
    }

    #[test]
    fn test_discover_walks_parents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shoal.yaml"), "name: p\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = ProjectConfig::discover(&nested).unwrap();
        assert_eq!(config.name, "p");
        assert_eq!(config.project_dir(), Some(dir.path()));
    }

    #[test]
    fn test_system_config_defaults() {
        let config = SystemConfig::from_str("").unwrap();
        assert!(config.proxy.is_none());
        assert_eq!(config.engine.step_delay_ms, 250);

        let config = SystemConfig::from_str("proxy:\n  url: shoal.local\n").unwrap();
        assert_eq!(config.proxy.unwrap().port, 80);
    }
}
