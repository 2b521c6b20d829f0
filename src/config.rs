use crate::errors::{Result, TestEnvError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = ".testenv.yml";

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub dependency: DependencyConfig,
    #[serde(default)]
    pub suite: SuiteConfig,
    /// Where to write the JSON run report, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
}

/// What to do when a container with the configured name already exists
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Fail,
    Reuse,
    Replace,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = TestEnvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(ConflictPolicy::Fail),
            "reuse" => Ok(ConflictPolicy::Reuse),
            "replace" => Ok(ConflictPolicy::Replace),
            other => Err(TestEnvError::Config(format!(
                "Invalid conflict policy '{}'. Expected fail, reuse or replace",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DependencyConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// `host:container` port mappings passed to `docker run -p`
    #[serde(default = "default_ports")]
    pub ports: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Extra arguments appended after the image
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

fn default_name() -> String {
    "testenv-redis".to_string()
}

fn default_image() -> String {
    "redis:7-alpine".to_string()
}

fn default_ports() -> Vec<String> {
    vec!["6379:6379".to_string()]
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            image: default_image(),
            ports: default_ports(),
            env: BTreeMap::new(),
            args: Vec::new(),
            on_conflict: ConflictPolicy::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

/// Probe executed inside the container until it reports ready
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReadinessConfig {
    /// Empty means "ready once `docker run` returns"
    #[serde(default = "default_probe")]
    pub command: Vec<String>,
    #[serde(default = "default_expect")]
    pub expect: Option<String>,
    #[serde(default = "default_readiness_timeout")]
    pub timeout: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_probe() -> Vec<String> {
    vec!["redis-cli".to_string(), "ping".to_string()]
}

fn default_expect() -> Option<String> {
    Some("PONG".to_string())
}

fn default_readiness_timeout() -> String {
    "30s".to_string()
}

fn default_interval() -> String {
    "500ms".to_string()
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            command: default_probe(),
            expect: default_expect(),
            timeout: default_readiness_timeout(),
            interval: default_interval(),
        }
    }
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }

    pub fn interval(&self) -> Result<Duration> {
        parse_duration(&self.interval)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SuiteConfig {
    #[serde(default = "default_suite_command")]
    pub command: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_suite_command() -> String {
    "pytest".to_string()
}

fn default_location() -> String {
    "tests".to_string()
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            command: default_suite_command(),
            location: default_location(),
            working_dir: None,
            timeout: None,
            env: BTreeMap::new(),
        }
    }
}

impl SuiteConfig {
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout.as_deref().map(parse_duration).transpose()
    }

    /// Full shell line: command followed by the suite location
    pub fn command_line(&self) -> String {
        if self.location.trim().is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.location)
        }
    }
}

/// Values given on the command line; each one beats the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub name: Option<String>,
    pub image: Option<String>,
    pub location: Option<String>,
    pub command: Option<String>,
    pub timeout: Option<String>,
    pub on_conflict: Option<ConflictPolicy>,
    pub report: Option<PathBuf>,
}

impl Config {
    /// Load `path`, or `.testenv.yml` in `dir` when no path is given.
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(dir: &Path, path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (dir.join(DEFAULT_CONFIG_FILE), false),
        };

        if !config_path.exists() {
            if explicit {
                return Err(TestEnvError::Config(format!(
                    "Config file not found: {}",
                    config_path.display()
                )));
            }
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str(content)
            .map_err(|e| TestEnvError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(name) = overrides.name {
            self.dependency.name = name;
        }
        if let Some(image) = overrides.image {
            self.dependency.image = image;
        }
        if let Some(location) = overrides.location {
            self.suite.location = location;
        }
        if let Some(command) = overrides.command {
            self.suite.command = command;
        }
        if let Some(timeout) = overrides.timeout {
            self.suite.timeout = Some(timeout);
        }
        if let Some(policy) = overrides.on_conflict {
            self.dependency.on_conflict = policy;
        }
        if let Some(report) = overrides.report {
            self.report = Some(report);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dependency.image.trim().is_empty() {
            return Err(TestEnvError::Config(
                "dependency.image cannot be empty".to_string(),
            ));
        }
        if sanitize_container_name(&self.dependency.name).is_empty() {
            return Err(TestEnvError::Config(format!(
                "Invalid dependency name: '{}'",
                self.dependency.name
            )));
        }
        if self.suite.command.trim().is_empty() {
            return Err(TestEnvError::Config(
                "suite.command cannot be empty".to_string(),
            ));
        }

        self.dependency.readiness.timeout()?;
        if self.dependency.readiness.interval()?.is_zero() {
            return Err(TestEnvError::Config(
                "dependency.readiness.interval must be greater than zero".to_string(),
            ));
        }
        self.suite.timeout()?;

        Ok(())
    }
}

/// Docker container names allow `[a-zA-Z0-9][a-zA-Z0-9_.-]`; we also lowercase
pub fn sanitize_container_name(name: &str) -> String {
    let sanitized = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect::<String>();

    sanitized
        .trim_matches(|c| c == '-' || c == '_' || c == '.')
        .to_string()
}

/// Parse a duration such as "500ms", "30s", "2m" or a bare number of seconds
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || TestEnvError::Config(format!("Invalid duration value: '{}'", value));

    if let Some(num) = value.strip_suffix("ms") {
        num.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid())
    } else if let Some(num) = value.strip_suffix('s') {
        num.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| invalid())
    } else if let Some(num) = value.strip_suffix('m') {
        let minutes = num.trim().parse::<u64>().map_err(|_| invalid())?;
        minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid)
    } else {
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| invalid())
    }
}
