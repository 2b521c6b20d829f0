use crate::cli::load_config;
use crate::config::Overrides;
use crate::docker::{ContainerState, DockerDependency};
use crate::errors::{Result, TestEnvError};
use colored::Colorize;
use std::path::Path;

/// Remove a dependency left behind by an interrupted run or a failed teardown
pub fn run(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let dependency = DockerDependency::new(config.dependency)?;

    if !dependency.is_docker_available() {
        return Err(TestEnvError::Docker(
            "Docker is not available. Please install Docker.".to_string(),
        ));
    }

    if dependency.status()? == ContainerState::Absent {
        println!("'{}' is not running, nothing to do", dependency.name());
        return Ok(());
    }

    println!("Removing '{}'...", dependency.name());
    dependency.remove()?;
    println!("{} '{}' removed", "✓".green(), dependency.name());

    Ok(())
}
