// Lifecycle state machine for a single orchestrated run

use crate::errors::{Result, TestEnvError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    NotStarted,
    DependencyUp,
    TestsRunning,
    TestsComplete,
    Torndown,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::NotStarted => "not_started",
            LifecycleState::DependencyUp => "dependency_up",
            LifecycleState::TestsRunning => "tests_running",
            LifecycleState::TestsComplete => "tests_complete",
            LifecycleState::Torndown => "torndown",
            LifecycleState::Failed => "failed",
        }
    }

    /// Torndown and Failed end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Torndown | LifecycleState::Failed)
    }

    fn can_advance_to(&self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::NotStarted, LifecycleState::DependencyUp)
                | (LifecycleState::NotStarted, LifecycleState::Failed)
                | (LifecycleState::DependencyUp, LifecycleState::TestsRunning)
                | (LifecycleState::TestsRunning, LifecycleState::TestsComplete)
                | (LifecycleState::TestsComplete, LifecycleState::Torndown)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state and every state visited, in order
#[derive(Debug, Clone)]
pub struct Lifecycle {
    history: Vec<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            history: vec![LifecycleState::NotStarted],
        }
    }

    pub fn state(&self) -> LifecycleState {
        // history is never empty
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::NotStarted)
    }

    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn advance(&mut self, next: LifecycleState) -> Result<()> {
        let current = self.state();
        if !current.can_advance_to(next) {
            return Err(TestEnvError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        tracing::debug!(from = %current, to = %next, "lifecycle transition");
        self.history.push(next);
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
