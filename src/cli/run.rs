use crate::cli::load_config;
use crate::config::Overrides;
use crate::docker::DockerDependency;
use crate::errors::Result;
use crate::orchestrator::{ExitStatus, Orchestrator};
use crate::report::RunReport;
use crate::signals;
use crate::suite::CommandSuite;
use colored::Colorize;
use std::path::Path;

/// Provision the dependency, run the suite, tear down, and report the exit status
pub fn run(config_path: Option<&Path>, overrides: Overrides) -> Result<ExitStatus> {
    let config = load_config(config_path, overrides)?;

    let provider = DockerDependency::new(config.dependency.clone())?;
    let executor = CommandSuite::new(config.suite.clone())?;
    let mut orchestrator = Orchestrator::new(provider, executor);

    // Ctrl-C ends the current wait instead of the process, so teardown still runs
    if let Err(e) = signals::install() {
        tracing::warn!(error = %e, "could not install interrupt handlers");
    }

    let outcome = orchestrator.run();

    if let Some(path) = &config.report {
        let report = RunReport::new(&config, &outcome);
        match report.write(path) {
            Ok(()) => eprintln!("Report written to {}", path.display()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write run report");
                eprintln!("{} Failed to write report: {}", "⚠ Warning:".yellow(), e);
            }
        }
    }

    Ok(outcome.exit_status)
}
