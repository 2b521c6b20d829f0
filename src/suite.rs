use crate::clock::{Clock, SystemClock};
use crate::config::SuiteConfig;
use crate::errors::Result;
use crate::orchestrator::{DependencyHandle, TestExecutor, TestRunResult};
use crate::signals::InterruptFlag;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

/// Runs the integration suite as a shell command.
///
/// Stdout and stderr are inherited so test output streams straight to the
/// operator. Whatever happens (non-zero exit, spawn error, timeout, interrupt)
/// ends up in the returned [`TestRunResult`].
pub struct CommandSuite {
    config: SuiteConfig,
    timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
    interrupt: InterruptFlag,
}

/// How waiting on the suite process ended
enum Waited {
    Exited(ExitStatus),
    TimedOut,
    Interrupted,
}

impl CommandSuite {
    pub fn new(config: SuiteConfig) -> Result<Self> {
        Self::new_with_clock(config, Arc::new(SystemClock))
    }

    pub fn new_with_clock(config: SuiteConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let timeout = config.timeout()?;
        Ok(Self {
            config,
            timeout,
            clock,
            interrupt: InterruptFlag::process(),
        })
    }

    /// Flag polled while the suite runs; once set the suite is killed
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn command_line(&self) -> String {
        self.config.command_line()
    }

    /// Environment handed to the suite so it can find the dependency
    fn build_env(&self, dependency: &DependencyHandle) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("TESTENV_DEPENDENCY".to_string(), dependency.name.clone());
        env.insert("TESTENV_DEPENDENCY_ID".to_string(), dependency.id.clone());
        for (key, value) in &self.config.env {
            env.insert(key.clone(), value.clone());
        }

        env
    }

    fn working_dir(&self) -> Option<PathBuf> {
        self.config.working_dir.clone()
    }

    /// The command is shell syntax; the location is passed as `$1` so the
    /// shell never re-parses it
    fn spawn(&self, dependency: &DependencyHandle) -> std::io::Result<Child> {
        let mut command = Command::new("sh");
        command.arg("-c");
        if self.config.location.trim().is_empty() {
            command.arg(&self.config.command);
        } else {
            command
                .arg(format!("{} \"$1\"", self.config.command))
                .arg("sh")
                .arg(&self.config.location);
        }
        command.envs(self.build_env(dependency));

        if let Some(dir) = self.working_dir() {
            command.current_dir(dir);
        }

        command.spawn()
    }
}

impl TestExecutor for CommandSuite {
    fn run(&mut self, dependency: &DependencyHandle) -> TestRunResult {
        let start = self.clock.now();
        let elapsed = |clock: &dyn Clock| clock.now().duration_since(start);
        tracing::debug!(command = %self.command_line(), "spawning test suite");

        let mut child = match self.spawn(dependency) {
            Ok(child) => child,
            Err(e) => {
                return TestRunResult::aborted(
                    format!("failed to start `{}`: {}", self.command_line(), e),
                    elapsed(self.clock.as_ref()),
                );
            }
        };

        let waited = wait_for_exit(
            &mut child,
            self.timeout,
            &self.interrupt,
            self.clock.as_ref(),
        );

        match waited {
            Ok(Waited::Exited(status)) => {
                TestRunResult::from_status_code(exit_code(&status), elapsed(self.clock.as_ref()))
            }
            Ok(Waited::TimedOut) => {
                let _ = child.kill();
                let _ = child.wait();
                TestRunResult::aborted(
                    format!(
                        "test suite timed out after {:?}",
                        self.timeout.unwrap_or_default()
                    ),
                    elapsed(self.clock.as_ref()),
                )
            }
            Ok(Waited::Interrupted) => {
                tracing::warn!("interrupted, stopping test suite");
                let _ = child.kill();
                let _ = child.wait();
                TestRunResult::aborted(
                    "test suite interrupted".to_string(),
                    elapsed(self.clock.as_ref()),
                )
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                TestRunResult::aborted(
                    format!("failed to monitor test suite: {}", e),
                    elapsed(self.clock.as_ref()),
                )
            }
        }
    }
}

/// Signal-terminated processes have no code; report them as -1
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Poll `try_wait` until the child exits, `timeout` passes, or the interrupt flag is set
fn wait_for_exit(
    child: &mut Child,
    timeout: Option<Duration>,
    interrupt: &InterruptFlag,
    clock: &dyn Clock,
) -> std::io::Result<Waited> {
    let start = clock.now();
    let poll_interval = Duration::from_millis(100);

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited::Exited(status));
        }
        if interrupt.is_set() {
            return Ok(Waited::Interrupted);
        }
        if let Some(timeout) = timeout {
            if clock.now().duration_since(start) >= timeout {
                return Ok(Waited::TimedOut);
            }
        }
        clock.sleep(poll_interval);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn handle() -> DependencyHandle {
        DependencyHandle {
            name: "testenv-redis".to_string(),
            id: "c0ffee".to_string(),
            reused: false,
        }
    }

    fn suite(command: &str, location: &str) -> SuiteConfig {
        SuiteConfig {
            command: command.to_string(),
            location: location.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_passing_command() {
        let mut runner = CommandSuite::new(suite("true", "")).unwrap();
        let result = runner.run(&handle());
        assert!(result.success);
        assert_eq!(result.status_code, 0);
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_failing_command_keeps_exit_code() {
        let mut runner = CommandSuite::new(suite("exit", "3")).unwrap();
        let result = runner.run(&handle());
        assert!(!result.success);
        assert_eq!(result.status_code, 3);
        assert!(result.failure.is_none());
    }

    #[test]
    fn test_env_and_working_dir_reach_the_suite() {
        let temp = TempDir::new().unwrap();
        let mut config = suite(
            "test \"$TESTENV_DEPENDENCY\" = testenv-redis && test \"$REDIS_PORT\" = 6380 && touch ran",
            "",
        );
        config.env.insert("REDIS_PORT".to_string(), "6380".to_string());
        config.working_dir = Some(temp.path().to_path_buf());

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(result.success, "suite saw unexpected environment");
        assert!(temp.path().join("ran").exists());
    }

    #[test]
    fn test_missing_working_dir_is_captured() {
        let mut config = suite("true", "");
        config.working_dir = Some(PathBuf::from("/nonexistent/testenv/dir"));

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(!result.success);
        assert_eq!(result.status_code, -1);
        assert!(result.failure.unwrap().contains("failed to start"));
    }

    #[test]
    fn test_timeout_kills_suite() {
        let mut config = suite("sleep", "30");
        config.timeout = Some("1s".to_string());

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(!result.success);
        assert!(result.failure.unwrap().contains("timed out after 1s"));
        assert!(result.duration < Duration::from_secs(30));
    }

    #[test]
    fn test_sub_second_timeout_is_reported_exactly() {
        let mut config = suite("sleep", "30");
        config.timeout = Some("300ms".to_string());

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(!result.success);
        assert!(result.failure.unwrap().contains("timed out after 300ms"));
    }

    #[test]
    fn test_interrupt_kills_suite() {
        let interrupt = InterruptFlag::detached();
        interrupt.set();
        let mut runner = CommandSuite::new(suite("sleep", "30"))
            .unwrap()
            .with_interrupt(interrupt);

        let result = runner.run(&handle());

        assert!(!result.success);
        assert_eq!(result.status_code, -1);
        assert_eq!(result.failure.as_deref(), Some("test suite interrupted"));
        assert!(result.duration < Duration::from_secs(30));
    }

    #[test]
    fn test_location_with_spaces_is_one_argument() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("suite dir")).unwrap();
        let mut config = suite("test -d", "suite dir");
        config.working_dir = Some(temp.path().to_path_buf());

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(result.success, "location was split on whitespace");
    }

    #[test]
    fn test_location_is_not_shell_evaluated() {
        let temp = TempDir::new().unwrap();
        let mut config = suite("test -d", "tests; touch injected");
        config.working_dir = Some(temp.path().to_path_buf());

        let mut runner = CommandSuite::new(config).unwrap();
        let result = runner.run(&handle());

        assert!(!result.success);
        assert!(!temp.path().join("injected").exists());
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let mut config = suite("true", "");
        config.timeout = Some("forever".to_string());
        assert!(CommandSuite::new(config).is_err());
    }
}
