//! Common test utilities for testenv integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use testenv::errors::{ProvisioningError, Result, TestEnvError};
use testenv::orchestrator::{DependencyHandle, DependencyProvider, TestExecutor, TestRunResult};

/// Shared, ordered record of collaborator calls
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// How the fake provider's `start` behaves
pub enum StartBehavior {
    Succeed,
    Conflict,
}

/// Dependency provider that records calls instead of touching Docker
pub struct FakeProvider {
    pub log: CallLog,
    pub start: StartBehavior,
    pub fail_stop: bool,
}

impl FakeProvider {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            start: StartBehavior::Succeed,
            fail_stop: false,
        }
    }
}

impl DependencyProvider for FakeProvider {
    fn describe(&self) -> String {
        "fake-redis".to_string()
    }

    fn start(&mut self) -> Result<DependencyHandle> {
        self.log.lock().unwrap().push("start".to_string());
        match self.start {
            StartBehavior::Succeed => Ok(DependencyHandle {
                name: "fake-redis".to_string(),
                id: "f00d".to_string(),
                reused: false,
            }),
            StartBehavior::Conflict => {
                Err(ProvisioningError::Conflict("fake-redis".to_string()).into())
            }
        }
    }

    fn stop(&mut self, handle: &DependencyHandle) -> Result<()> {
        self.log.lock().unwrap().push(format!("stop:{}", handle.name));
        if self.fail_stop {
            return Err(TestEnvError::Teardown("container is stuck".to_string()));
        }
        Ok(())
    }
}

/// How the fake suite behaves
pub enum SuiteBehavior {
    Pass,
    /// Fails with pytest's "tests failed" code after `n` failing tests
    FailTests(u32),
    Panic,
}

pub struct FakeSuite {
    pub log: CallLog,
    pub behavior: SuiteBehavior,
}

impl FakeSuite {
    pub fn new(log: &CallLog, behavior: SuiteBehavior) -> Self {
        Self {
            log: log.clone(),
            behavior,
        }
    }
}

impl TestExecutor for FakeSuite {
    fn run(&mut self, dependency: &DependencyHandle) -> TestRunResult {
        self.log
            .lock()
            .unwrap()
            .push(format!("run:{}", dependency.name));
        match self.behavior {
            SuiteBehavior::Pass => TestRunResult::from_status_code(0, Duration::from_millis(10)),
            SuiteBehavior::FailTests(_failed) => {
                TestRunResult::from_status_code(1, Duration::from_millis(10))
            }
            SuiteBehavior::Panic => panic!("suite exploded"),
        }
    }
}

/// Shell stand-in for the docker CLI. Container state lives in marker files
/// next to the script; every invocation is appended to `calls.log`.
const DOCKER_STUB: &str = r#"#!/bin/sh
DIR="$(cd "$(dirname "$0")" && pwd)"
echo "$*" >> "$DIR/calls.log"
case "$1" in
  --version)
    echo "Docker version 24.0.0, build stub"
    exit 0 ;;
  inspect)
    if [ -f "$DIR/running" ]; then echo true; exit 0; fi
    if [ -f "$DIR/stopped" ]; then echo false; exit 0; fi
    echo "Error: No such object: $4" >&2
    exit 1 ;;
  run)
    if [ -f "$DIR/fail_run" ]; then
      # like a port clash: the container is created, then fails to start
      touch "$DIR/stopped"
      echo "port is already allocated" >&2
      exit 125
    fi
    touch "$DIR/running"
    echo deadbeef
    exit 0 ;;
  start)
    rm -f "$DIR/stopped"
    touch "$DIR/running"
    exit 0 ;;
  exec)
    if [ -f "$DIR/never_ready" ]; then echo "Could not connect" >&2; exit 1; fi
    echo PONG
    exit 0 ;;
  rm)
    if [ -f "$DIR/fail_rm" ]; then echo "permission denied" >&2; exit 1; fi
    if [ -f "$DIR/running" ] || [ -f "$DIR/stopped" ]; then
      rm -f "$DIR/running" "$DIR/stopped"
      echo "$3"
      exit 0
    fi
    echo "Error: No such container: $3" >&2
    exit 1 ;;
esac
echo "unexpected docker call: $*" >&2
exit 1
"#;

/// Scratch directory holding a stub `docker` binary and a project dir
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub bin_dir: PathBuf,
    pub project_dir: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let bin_dir = temp_dir.path().join("bin");
        let project_dir = temp_dir.path().join("project");
        fs::create_dir_all(&bin_dir).expect("Failed to create bin directory");
        fs::create_dir_all(&project_dir).expect("Failed to create project directory");

        let docker = bin_dir.join("docker");
        fs::write(&docker, DOCKER_STUB).expect("Failed to write docker stub");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&docker, fs::Permissions::from_mode(0o755))
                .expect("Failed to make docker stub executable");
        }

        TestWorkspace {
            temp_dir,
            bin_dir,
            project_dir,
        }
    }

    pub fn docker_path(&self) -> PathBuf {
        self.bin_dir.join("docker")
    }

    /// Create a marker file that changes the stub's behavior
    /// (`running`, `stopped`, `fail_run`, `never_ready`, `fail_rm`)
    pub fn set_marker(&self, marker: &str) {
        fs::write(self.bin_dir.join(marker), "").expect("Failed to write marker");
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.bin_dir.join(marker).exists()
    }

    /// Docker invocations so far, one per line
    pub fn docker_calls(&self) -> Vec<String> {
        fs::read_to_string(self.bin_dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn docker_calls_starting_with(&self, prefix: &str) -> usize {
        self.docker_calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn create_config(&self, content: &str) {
        fs::write(self.project_dir.join(".testenv.yml"), content)
            .expect("Failed to write config file");
    }

    pub fn path(&self) -> &Path {
        &self.project_dir
    }

    /// Run the testenv binary in the project dir with the stub first on PATH
    pub fn testenv(&self, args: &[&str]) -> CommandResult {
        let path = format!(
            "{}:{}",
            self.bin_dir.display(),
            std::env::var("PATH").unwrap_or_default()
        );
        let output = Command::new(env!("CARGO_BIN_EXE_testenv"))
            .args(args)
            .current_dir(&self.project_dir)
            .env("PATH", path)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute testenv command");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code(),
        }
    }
}

/// Result of running a command
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn assert_exit_code(&self, expected: i32) {
        assert_eq!(
            self.exit_code,
            Some(expected),
            "unexpected exit code\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
    }

    pub fn assert_stdout_contains(&self, text: &str) {
        assert!(
            self.stdout.contains(text),
            "stdout does not contain '{}'\nstdout: {}",
            text,
            self.stdout
        );
    }

    pub fn assert_stderr_contains(&self, text: &str) {
        assert!(
            self.stderr.contains(text),
            "stderr does not contain '{}'\nstderr: {}",
            text,
            self.stderr
        );
    }
}
