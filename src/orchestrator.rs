// Environment orchestrator: provision -> run suite -> tear down -> exit status

use crate::errors::Result;
use crate::lifecycle::{Lifecycle, LifecycleState};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// The running dependency instance. Only the orchestrator holds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyHandle {
    /// Container name
    pub name: String,
    /// Runtime identifier (container id)
    pub id: String,
    /// True when an already existing instance was taken over instead of created
    pub reused: bool,
}

/// Outcome of one test suite execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunResult {
    pub success: bool,
    pub status_code: i32,
    pub duration: Duration,
    /// Set when the suite did not run to completion (spawn error, timeout, panic)
    pub failure: Option<String>,
}

impl TestRunResult {
    pub fn from_status_code(status_code: i32, duration: Duration) -> Self {
        Self {
            success: status_code == 0,
            status_code,
            duration,
            failure: None,
        }
    }

    pub fn aborted(reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            status_code: -1,
            duration,
            failure: Some(reason.into()),
        }
    }
}

/// Brings the dependency service up and down
pub trait DependencyProvider {
    /// Human readable name for progress output
    fn describe(&self) -> String;

    fn start(&mut self) -> Result<DependencyHandle>;

    /// Must succeed when the dependency is already gone
    fn stop(&mut self, handle: &DependencyHandle) -> Result<()>;
}

/// Runs the test suite. Failures are reported in the result, never as errors.
pub trait TestExecutor {
    fn run(&mut self, dependency: &DependencyHandle) -> TestRunResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    TestsFailed,
    ConfigError,
    ProvisioningFailed,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::TestsFailed => 1,
            ExitStatus::ConfigError => 2,
            ExitStatus::ProvisioningFailed => 3,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub history: Vec<LifecycleState>,
    pub handle: Option<DependencyHandle>,
    pub test_result: Option<TestRunResult>,
    pub provisioning_error: Option<String>,
    pub teardown_error: Option<String>,
    pub exit_status: ExitStatus,
}

impl RunOutcome {
    pub fn final_state(&self) -> LifecycleState {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::NotStarted)
    }
}

pub struct Orchestrator<P, E> {
    provider: P,
    executor: E,
}

impl<P: DependencyProvider, E: TestExecutor> Orchestrator<P, E> {
    pub fn new(provider: P, executor: E) -> Self {
        Self { provider, executor }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Drive one full lifecycle. Teardown runs exactly once whenever
    /// provisioning succeeded, whatever the suite did.
    pub fn run(&mut self) -> RunOutcome {
        let started_at = Utc::now();
        let mut lifecycle = Lifecycle::new();
        let dependency = self.provider.describe();

        eprintln!("Starting {}...", dependency.bold());
        let handle = match self.provider.start() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(dependency = %dependency, error = %e, "provisioning failed");
                eprintln!("{} {}", "✗".red(), e);
                record(&mut lifecycle, LifecycleState::Failed);
                return RunOutcome {
                    started_at,
                    history: lifecycle.history().to_vec(),
                    handle: None,
                    test_result: None,
                    provisioning_error: Some(e.to_string()),
                    teardown_error: None,
                    exit_status: ExitStatus::ProvisioningFailed,
                };
            }
        };
        if handle.reused {
            eprintln!("{} Reusing existing '{}'", "✓".green(), handle.name);
        } else {
            eprintln!("{} '{}' is ready", "✓".green(), handle.name);
        }

        let test_result = self.use_dependency(&mut lifecycle, &handle);

        let teardown_error = match self.provider.stop(&handle) {
            Ok(()) => {
                eprintln!("{} '{}' torn down", "✓".green(), handle.name);
                None
            }
            Err(e) => {
                tracing::warn!(
                    dependency = %handle.name,
                    error = %e,
                    "teardown failed, the dependency may still be running"
                );
                eprintln!(
                    "{} Failed to tear down '{}': {}",
                    "⚠ Warning:".yellow(),
                    handle.name,
                    e
                );
                eprintln!(
                    "  Clean it up manually with `testenv down --name {}`",
                    handle.name
                );
                Some(e.to_string())
            }
        };
        record(&mut lifecycle, LifecycleState::Torndown);

        let exit_status = if test_result.success {
            ExitStatus::Success
        } else {
            ExitStatus::TestsFailed
        };

        RunOutcome {
            started_at,
            history: lifecycle.history().to_vec(),
            handle: Some(handle),
            test_result: Some(test_result),
            provisioning_error: None,
            teardown_error,
            exit_status,
        }
    }

    /// Everything between provisioning and teardown. Panics in the
    /// executor are turned into a failed result so teardown still runs.
    fn use_dependency(
        &mut self,
        lifecycle: &mut Lifecycle,
        handle: &DependencyHandle,
    ) -> TestRunResult {
        record(lifecycle, LifecycleState::DependencyUp);
        record(lifecycle, LifecycleState::TestsRunning);

        eprintln!("Running test suite against '{}'...", handle.name);
        let started = Instant::now();
        let executor = &mut self.executor;
        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.run(handle)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                tracing::error!(reason = %reason, "test executor panicked");
                TestRunResult::aborted(
                    format!("test executor panicked: {}", reason),
                    started.elapsed(),
                )
            });

        record(lifecycle, LifecycleState::TestsComplete);

        if result.success {
            eprintln!(
                "{} Test suite passed ({:.1}s)",
                "✓".green(),
                result.duration.as_secs_f64()
            );
        } else {
            match &result.failure {
                Some(reason) => eprintln!("{} Test suite aborted: {}", "✗".red(), reason),
                None => eprintln!(
                    "{} Test suite failed with exit code {}",
                    "✗".red(),
                    result.status_code
                ),
            }
        }

        result
    }
}

/// Transitions are fixed by `run`, so a rejection here is a bug; it is
/// logged rather than allowed to skip teardown.
fn record(lifecycle: &mut Lifecycle, next: LifecycleState) {
    if let Err(e) = lifecycle.advance(next) {
        tracing::error!(error = %e, "unexpected lifecycle transition");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
