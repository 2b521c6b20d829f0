// Docker container lifecycle for the test dependency
// Create, probe, and remove a single named container

use crate::clock::{Clock, SystemClock};
use crate::config::{sanitize_container_name, ConflictPolicy, DependencyConfig};
use crate::docker::readiness::{wait_until_ready, Probe};
use crate::errors::{ProvisioningError, Result, TestEnvError};
use crate::orchestrator::{DependencyHandle, DependencyProvider};
use crate::signals::InterruptFlag;
use std::ffi::OsString;
use std::process::{Command, Output};
use std::sync::Arc;

/// What `docker inspect` says about the named container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Absent,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Absent => "absent",
        }
    }
}

/// Manages one named container through the `docker` CLI
pub struct DockerDependency {
    config: DependencyConfig,
    name: String,
    program: OsString,
    clock: Arc<dyn Clock>,
    interrupt: InterruptFlag,
}

impl DockerDependency {
    pub fn new(config: DependencyConfig) -> Result<Self> {
        Self::new_with_clock(config, Arc::new(SystemClock))
    }

    pub fn new_with_clock(config: DependencyConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let name = sanitize_container_name(&config.name);
        if name.is_empty() {
            return Err(TestEnvError::Config(format!(
                "Invalid dependency name: '{}'",
                config.name
            )));
        }

        Ok(Self {
            config,
            name,
            program: OsString::from("docker"),
            clock,
            interrupt: InterruptFlag::process(),
        })
    }

    /// Use a different docker-compatible binary (e.g. `podman`, or a stub in tests)
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Flag checked between readiness attempts; set means give up and clean up
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Sanitized container name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_docker_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    pub fn status(&self) -> Result<ContainerState> {
        let output = self.docker(&self.build_inspect_args())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_container(&stderr) {
                return Ok(ContainerState::Absent);
            }
            return Err(TestEnvError::Docker(format!(
                "Failed to inspect '{}': {}",
                self.name,
                stderr.trim()
            )));
        }

        let running = String::from_utf8_lossy(&output.stdout).trim() == "true";
        Ok(if running {
            ContainerState::Running
        } else {
            ContainerState::Stopped
        })
    }

    /// Force-remove the container. Succeeds when it is already gone.
    pub fn remove(&self) -> Result<()> {
        let output = self.docker(&self.build_remove_args())?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_container(&stderr) {
            tracing::debug!(dependency = %self.name, "container already removed");
            return Ok(());
        }

        Err(TestEnvError::Teardown(format!(
            "docker rm -f {} failed: {}",
            self.name,
            stderr.trim()
        )))
    }

    /// `docker run` arguments (no shell involved, so no injection)
    pub fn build_run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];

        for port in &self.config.ports {
            args.push("-p".to_string());
            args.push(port.clone());
        }

        for (key, value) in &self.config.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(self.config.image.clone());
        args.extend(self.config.args.iter().cloned());
        args
    }

    pub fn build_remove_args(&self) -> Vec<String> {
        vec!["rm".to_string(), "-f".to_string(), self.name.clone()]
    }

    pub fn build_inspect_args(&self) -> Vec<String> {
        vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            self.name.clone(),
        ]
    }

    /// `docker exec` arguments for the readiness probe, if one is configured
    pub fn build_probe_args(&self) -> Option<Vec<String>> {
        let command = &self.config.readiness.command;
        if command.is_empty() {
            return None;
        }

        let mut args = vec!["exec".to_string(), self.name.clone()];
        args.extend(command.iter().cloned());
        Some(args)
    }

    fn create(&self) -> Result<String> {
        let output = self.docker(&self.build_run_args())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisioningError::StartFailed {
                name: self.name.clone(),
                reason: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn restart_stopped(&self) -> Result<()> {
        let output = self.docker(&["start".to_string(), self.name.clone()])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisioningError::StartFailed {
                name: self.name.clone(),
                reason: stderr.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn probe(&self) -> Result<Probe> {
        if self.interrupt.is_set() {
            return Err(ProvisioningError::Interrupted {
                name: self.name.clone(),
            }
            .into());
        }

        if self.status()? != ContainerState::Running {
            return Ok(Probe::Exited);
        }

        let Some(args) = self.build_probe_args() else {
            return Ok(Probe::Ready);
        };

        let output = self.docker(&args)?;
        if !output.status.success() {
            return Ok(Probe::Pending);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match &self.config.readiness.expect {
            Some(expected) if !stdout.contains(expected.as_str()) => Ok(Probe::Pending),
            _ => Ok(Probe::Ready),
        }
    }

    fn wait_ready(&self) -> Result<()> {
        let timeout = self.config.readiness.timeout()?;
        let interval = self.config.readiness.interval()?;

        eprintln!(
            "Waiting for '{}' to become ready (timeout: {:?})...",
            self.name, timeout
        );
        wait_until_ready(&self.name, timeout, interval, self.clock.as_ref(), || {
            self.probe()
        })?;
        Ok(())
    }

    fn discard_created(&self, context: &str) {
        if let Err(cleanup) = self.remove() {
            tracing::warn!(dependency = %self.name, error = %cleanup, "{}", context);
        }
    }

    fn docker(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(program = ?self.program, args = ?args, "running docker command");
        Ok(Command::new(&self.program).args(args).output()?)
    }
}

impl DependencyProvider for DockerDependency {
    fn describe(&self) -> String {
        format!("{} ({})", self.name, self.config.image)
    }

    fn start(&mut self) -> Result<DependencyHandle> {
        if !self.is_docker_available() {
            return Err(ProvisioningError::Unavailable.into());
        }

        let existing = self.status()?;
        if existing != ContainerState::Absent {
            match self.config.on_conflict {
                ConflictPolicy::Fail => {
                    return Err(ProvisioningError::Conflict(self.name.clone()).into());
                }
                ConflictPolicy::Reuse => {
                    tracing::info!(dependency = %self.name, state = existing.as_str(), "reusing existing container");
                    if existing == ContainerState::Stopped {
                        self.restart_stopped()?;
                    }
                    self.wait_ready()?;
                    return Ok(DependencyHandle {
                        name: self.name.clone(),
                        id: self.name.clone(),
                        reused: true,
                    });
                }
                ConflictPolicy::Replace => {
                    tracing::info!(dependency = %self.name, "replacing existing container");
                    self.remove().map_err(|e| ProvisioningError::StartFailed {
                        name: self.name.clone(),
                        reason: format!("could not remove existing container: {}", e),
                    })?;
                }
            }
        }

        // a failed `docker run` can still leave a created container behind
        let id = match self.create() {
            Ok(id) => id,
            Err(e) => {
                self.discard_created("failed to remove container after docker run failed");
                return Err(e);
            }
        };

        if let Err(e) = self.wait_ready() {
            self.discard_created("failed to remove container that never became ready");
            return Err(e);
        }

        Ok(DependencyHandle {
            name: self.name.clone(),
            id,
            reused: false,
        })
    }

    fn stop(&mut self, handle: &DependencyHandle) -> Result<()> {
        if handle.name != self.name {
            return Err(TestEnvError::Teardown(format!(
                "handle '{}' does not belong to dependency '{}'",
                handle.name, self.name
            )));
        }
        self.remove()
    }
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}
