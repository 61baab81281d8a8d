//! Configuration management for drydock
//!
//! Settings are resolved in three layers: built-in defaults, an optional
//! `drydock.toml` file, and `DRYDOCK_*` environment variables (strongest).
//! CLI flags override individual fields on top of the loaded configuration.
//!
//! # Environment Variables
//!
//! - `DRYDOCK_INSTANCE`: instance name - default: "svc"
//! - `DRYDOCK_IMAGE`: image reference as `name:tag` - default: "svc:latest"
//! - `DRYDOCK_HOST_PORT`: host port to bind - default: "9090"
//! - `DRYDOCK_CONTAINER_PORT`: service port inside the container - default: "9090"
//! - `DRYDOCK_GRACE_PERIOD`: seconds to wait before probing - default: "15"
//! - `DRYDOCK_PROBE_TIMEOUT`: per-probe timeout in seconds - default: "10"
//! - `DRYDOCK_LIVENESS_PATH`: liveness probe path - default: "/app/"
//! - `DRYDOCK_CATALOG_PATH`: catalog probe path, empty to disable - default: "/products"
//! - `DRYDOCK_BUILD_COMMAND`: build command (whitespace-split) - default: "./mvnw clean package"
//! - `DRYDOCK_ARTIFACT_GLOB`: glob selecting the built artifact - default: "target/*.jar"
//! - `DRYDOCK_BASE_IMAGE`: base image for the runtime layer - default: "eclipse-temurin:17-jre"
//! - `DRYDOCK_ENTRYPOINT`: launch command, `{artifact}` expands to the
//!   artifact path inside the image - default: "java -jar {artifact}"
//! - `DRYDOCK_WORKDIR`: source tree to build - default: "."
//! - `DRYDOCK_STATE_DIR`: lock files and deployment records - default:
//!   platform data dir + "drydock"
//! - `DRYDOCK_LOG_LEVEL`: logging level - default: "info"

use crate::image::{reference::is_valid_instance_name, ImageRef, ImageRefError};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_INSTANCE: &str = "svc";
const DEFAULT_IMAGE: &str = "svc:latest";
const DEFAULT_HOST_PORT: u16 = 9090;
const DEFAULT_CONTAINER_PORT: u16 = 9090;
const DEFAULT_GRACE_PERIOD_SECS: u64 = 15;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LIVENESS_PATH: &str = "/app/";
const DEFAULT_CATALOG_PATH: &str = "/products";
const DEFAULT_BUILD_COMMAND: &str = "./mvnw clean package";
const DEFAULT_ARTIFACT_GLOB: &str = "target/*.jar";
const DEFAULT_BASE_IMAGE: &str = "eclipse-temurin:17-jre";
const DEFAULT_ENTRYPOINT: &str = "java -jar {artifact}";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Config file name probed in the working directory when no path is given
const CONFIG_FILE_NAME: &str = "drydock.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("failed to parse config file {}: {source}", .path.display())]
    FileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Image reference was malformed
    #[error("invalid image reference: {0}")]
    InvalidImage(#[from] ImageRefError),

    /// Configuration validation failed
    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse a configuration value
    #[error("failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Optional fields as they appear in `drydock.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    instance: Option<String>,
    image: Option<String>,
    host_port: Option<u16>,
    container_port: Option<u16>,
    grace_period_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    liveness_path: Option<String>,
    catalog_path: Option<String>,
    build_command: Option<Vec<String>>,
    artifact_glob: Option<String>,
    base_image: Option<String>,
    entrypoint: Option<Vec<String>>,
    workdir: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    log_level: Option<String>,
}

/// Main configuration structure for drydock
///
/// `Default::default()` resolves built-in defaults plus environment
/// overrides; [`DrydockConfig::load`] adds the config-file layer in between.
#[derive(Debug, Clone)]
pub struct DrydockConfig {
    /// Instance name managed by the supervisor
    pub instance: String,

    /// Image reference produced and deployed by the pipeline
    pub image: ImageRef,

    /// Host port bound to the instance
    pub host_port: u16,

    /// Port the service listens on inside the container
    pub container_port: u16,

    /// Seconds to wait after instance start before probing
    pub grace_period_secs: u64,

    /// Per-probe HTTP timeout in seconds
    pub probe_timeout_secs: u64,

    /// Liveness probe path on the bound host port
    pub liveness_path: String,

    /// Catalog probe path; None disables the catalog check
    pub catalog_path: Option<String>,

    /// Build command producing the artifact, as argv
    pub build_command: Vec<String>,

    /// Glob selecting the built artifact, relative to the workdir
    pub artifact_glob: String,

    /// Base image for the runtime layer
    pub base_image: String,

    /// Launch command baked into the image; `{artifact}` expands to the
    /// artifact path inside the image
    pub entrypoint: Vec<String>,

    /// Source tree the build command runs in
    pub workdir: PathBuf,

    /// Directory holding deploy locks and deployment records
    pub state_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for DrydockConfig {
    fn default() -> Self {
        let mut config = Self::builtin();
        config.apply_env();
        config
    }
}

impl DrydockConfig {
    /// Built-in defaults, before any file or environment layer.
    fn builtin() -> Self {
        Self {
            instance: DEFAULT_INSTANCE.to_string(),
            // The built-in reference is statically valid
            image: DEFAULT_IMAGE.parse().unwrap_or(ImageRef {
                name: DEFAULT_INSTANCE.to_string(),
                tag: "latest".to_string(),
            }),
            host_port: DEFAULT_HOST_PORT,
            container_port: DEFAULT_CONTAINER_PORT,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            liveness_path: DEFAULT_LIVENESS_PATH.to_string(),
            catalog_path: Some(DEFAULT_CATALOG_PATH.to_string()),
            build_command: split_command(DEFAULT_BUILD_COMMAND),
            artifact_glob: DEFAULT_ARTIFACT_GLOB.to_string(),
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            entrypoint: split_command(DEFAULT_ENTRYPOINT),
            workdir: PathBuf::from("."),
            state_dir: default_state_dir(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Loads configuration: defaults, then `drydock.toml` (explicit path or
    /// probed in the working directory), then environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::builtin();

        let file_path = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let probed = PathBuf::from(CONFIG_FILE_NAME);
                probed.exists().then_some(probed)
            }
        };

        if let Some(path) = file_path {
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::FileRead {
                path: path.clone(),
                source,
            })?;
            let file: FileConfig =
                toml::from_str(&raw).map_err(|source| ConfigError::FileParse {
                    path: path.clone(),
                    source,
                })?;
            config.apply_file(file)?;
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(instance) = file.instance {
            self.instance = instance;
        }
        if let Some(image) = file.image {
            self.image = image.parse()?;
        }
        if let Some(port) = file.host_port {
            self.host_port = port;
        }
        if let Some(port) = file.container_port {
            self.container_port = port;
        }
        if let Some(secs) = file.grace_period_secs {
            self.grace_period_secs = secs;
        }
        if let Some(secs) = file.probe_timeout_secs {
            self.probe_timeout_secs = secs;
        }
        if let Some(path) = file.liveness_path {
            self.liveness_path = path;
        }
        if let Some(path) = file.catalog_path {
            self.catalog_path = (!path.is_empty()).then_some(path);
        }
        if let Some(command) = file.build_command {
            self.build_command = command;
        }
        if let Some(glob) = file.artifact_glob {
            self.artifact_glob = glob;
        }
        if let Some(base) = file.base_image {
            self.base_image = base;
        }
        if let Some(entrypoint) = file.entrypoint {
            self.entrypoint = entrypoint;
        }
        if let Some(workdir) = file.workdir {
            self.workdir = workdir;
        }
        if let Some(state_dir) = file.state_dir {
            self.state_dir = state_dir;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(instance) = env::var("DRYDOCK_INSTANCE") {
            self.instance = instance;
        }
        if let Some(image) = env::var("DRYDOCK_IMAGE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.image = image;
        }
        if let Some(port) = parse_env("DRYDOCK_HOST_PORT") {
            self.host_port = port;
        }
        if let Some(port) = parse_env("DRYDOCK_CONTAINER_PORT") {
            self.container_port = port;
        }
        if let Some(secs) = parse_env("DRYDOCK_GRACE_PERIOD") {
            self.grace_period_secs = secs;
        }
        if let Some(secs) = parse_env("DRYDOCK_PROBE_TIMEOUT") {
            self.probe_timeout_secs = secs;
        }
        if let Ok(path) = env::var("DRYDOCK_LIVENESS_PATH") {
            self.liveness_path = path;
        }
        if let Ok(path) = env::var("DRYDOCK_CATALOG_PATH") {
            self.catalog_path = (!path.is_empty()).then_some(path);
        }
        if let Ok(command) = env::var("DRYDOCK_BUILD_COMMAND") {
            self.build_command = split_command(&command);
        }
        if let Ok(glob) = env::var("DRYDOCK_ARTIFACT_GLOB") {
            self.artifact_glob = glob;
        }
        if let Ok(base) = env::var("DRYDOCK_BASE_IMAGE") {
            self.base_image = base;
        }
        if let Ok(entrypoint) = env::var("DRYDOCK_ENTRYPOINT") {
            self.entrypoint = split_command(&entrypoint);
        }
        if let Ok(workdir) = env::var("DRYDOCK_WORKDIR") {
            self.workdir = PathBuf::from(workdir);
        }
        if let Ok(state_dir) = env::var("DRYDOCK_STATE_DIR") {
            self.state_dir = PathBuf::from(state_dir);
        }
        if let Ok(level) = env::var("DRYDOCK_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` on the first violated check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_instance_name(&self.instance) {
            return Err(ConfigError::ValidationFailed(format!(
                "invalid instance name '{}'",
                self.instance
            )));
        }

        if self.host_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "host port must be non-zero".to_string(),
            ));
        }
        if self.container_port == 0 {
            return Err(ConfigError::ValidationFailed(
                "container port must be non-zero".to_string(),
            ));
        }

        // The grace wait is a fixed suspension, keep it bounded
        if self.grace_period_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "grace period cannot exceed 10 minutes".to_string(),
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "probe timeout must be at least 1 second".to_string(),
            ));
        }

        if !self.liveness_path.starts_with('/') {
            return Err(ConfigError::ValidationFailed(format!(
                "liveness path '{}' must start with '/'",
                self.liveness_path
            )));
        }
        if let Some(path) = &self.catalog_path {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationFailed(format!(
                    "catalog path '{}' must start with '/'",
                    path
                )));
            }
        }

        if self.build_command.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "build command is empty".to_string(),
            ));
        }
        if self.artifact_glob.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "artifact glob is empty".to_string(),
            ));
        }
        if self.entrypoint.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "entrypoint is empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// The fixed wait between instance start and the first probe.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Per-probe HTTP timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut map = std::collections::BTreeMap::new();

        map.insert("instance".to_string(), self.instance.clone());
        map.insert("image".to_string(), self.image.to_string());
        map.insert("host_port".to_string(), self.host_port.to_string());
        map.insert(
            "container_port".to_string(),
            self.container_port.to_string(),
        );
        map.insert(
            "grace_period_secs".to_string(),
            self.grace_period_secs.to_string(),
        );
        map.insert("liveness_path".to_string(), self.liveness_path.clone());
        if let Some(path) = &self.catalog_path {
            map.insert("catalog_path".to_string(), path.clone());
        }
        map.insert(
            "build_command".to_string(),
            self.build_command.join(" "),
        );
        map.insert("artifact_glob".to_string(), self.artifact_glob.clone());
        map.insert("base_image".to_string(), self.base_image.clone());
        map.insert("workdir".to_string(), self.workdir.display().to_string());
        map.insert(
            "state_dir".to_string(),
            self.state_dir.display().to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for DrydockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Drydock Configuration:")?;
        for (key, value) in self.to_display_map() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Splits a command string on whitespace into argv form.
fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("drydock")
}
