use crate::cli::load_config;
use crate::config::Overrides;
use crate::docker::{ContainerState, DockerDependency};
use crate::errors::Result;
use colored::Colorize;
use std::path::Path;

/// Show whether the configured dependency container exists and is running
pub fn run(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let dependency = DockerDependency::new(config.dependency.clone())?;

    println!("{:<24} {:<24} {:<10}", "DEPENDENCY", "IMAGE", "STATUS");
    println!("{}", "-".repeat(58));

    let status = if dependency.is_docker_available() {
        match dependency.status()? {
            ContainerState::Running => "running".green(),
            ContainerState::Stopped => "stopped".yellow(),
            ContainerState::Absent => "absent".normal(),
        }
    } else {
        "no docker".red()
    };

    println!(
        "{:<24} {:<24} {:<10}",
        dependency.name(),
        config.dependency.image,
        status
    );

    Ok(())
}
