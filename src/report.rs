// JSON summary of one orchestrated run

use crate::config::Config;
use crate::errors::Result;
use crate::lifecycle::LifecycleState;
use crate::orchestrator::RunOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub dependency: DependencyReport,
    pub suite: SuiteReport,
    pub final_state: LifecycleState,
    pub history: Vec<LifecycleState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    pub exit_code: i32,
}

#[derive(Debug, Serialize)]
pub struct DependencyReport {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reused: bool,
}

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub command: String,
    /// Absent when the suite never ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RunReport {
    pub fn new(config: &Config, outcome: &RunOutcome) -> Self {
        let handle = outcome.handle.as_ref();
        let result = outcome.test_result.as_ref();

        Self {
            started_at: outcome.started_at,
            dependency: DependencyReport {
                name: handle
                    .map(|h| h.name.clone())
                    .unwrap_or_else(|| config.dependency.name.clone()),
                image: config.dependency.image.clone(),
                id: handle.map(|h| h.id.clone()),
                reused: handle.map(|h| h.reused).unwrap_or(false),
            },
            suite: SuiteReport {
                command: config.suite.command_line(),
                success: result.map(|r| r.success),
                status_code: result.map(|r| r.status_code),
                duration_ms: result.map(|r| r.duration.as_millis()),
                failure: result.and_then(|r| r.failure.clone()),
            },
            final_state: outcome.final_state(),
            history: outcome.history.clone(),
            provisioning_error: outcome.provisioning_error.clone(),
            teardown_error: outcome.teardown_error.clone(),
            exit_code: outcome.exit_status.code(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), "wrote run report");
        Ok(())
    }
}
