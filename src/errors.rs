use crate::lifecycle::LifecycleState;
use std::time::Duration;
use thiserror::Error;

/// Reasons the dependency could not be brought up
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Docker is not available. Please install Docker.")]
    Unavailable,

    #[error("A container named '{0}' already exists (set on_conflict to 'reuse' or 'replace', or run `testenv down`)")]
    Conflict(String),

    #[error("Failed to start '{name}': {reason}")]
    StartFailed { name: String, reason: String },

    #[error("'{name}' did not become ready within {timeout:?}")]
    NotReady { name: String, timeout: Duration },

    #[error("Interrupted while starting '{name}'")]
    Interrupted { name: String },

    #[error("'{name}' exited before becoming ready")]
    Exited { name: String },
}

#[derive(Error, Debug)]
pub enum TestEnvError {
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Docker command failed: {0}")]
    Docker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TestEnvError>;
