use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use testenv::cli;
use testenv::config::{ConflictPolicy, Overrides};
use testenv::errors::Result;
use testenv::orchestrator::ExitStatus;

#[derive(Parser)]
#[command(name = "testenv")]
#[command(about = "Run an integration suite against a throwaway dependency container", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dependency, run the suite, and always tear the dependency down
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Test suite location passed to the suite command
        #[arg(long)]
        suite: Option<String>,

        /// Command that runs the suite (default: pytest)
        #[arg(long)]
        command: Option<String>,

        /// Suite timeout, e.g. 90s or 10m
        #[arg(long)]
        timeout: Option<String>,

        /// What to do if the container already exists: fail, reuse or replace
        #[arg(long, value_parser = parse_conflict_policy)]
        on_conflict: Option<ConflictPolicy>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Remove a dependency container left behind by an earlier run
    Down {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show the dependency container status
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Config file (default: ./.testenv.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dependency container name
    #[arg(long)]
    name: Option<String>,

    /// Dependency image
    #[arg(long)]
    image: Option<String>,
}

impl TargetArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            name: self.name.clone(),
            image: self.image.clone(),
            ..Default::default()
        }
    }
}

fn parse_conflict_policy(value: &str) -> std::result::Result<ConflictPolicy, String> {
    value.parse().map_err(|e: testenv::errors::TestEnvError| e.to_string())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(command: Commands) -> Result<ExitStatus> {
    match command {
        Commands::Run {
            target,
            suite,
            command,
            timeout,
            on_conflict,
            report,
        } => {
            let overrides = Overrides {
                location: suite,
                command,
                timeout,
                on_conflict,
                report,
                ..target.overrides()
            };
            cli::run::run(target.config.as_deref(), overrides)
        }
        Commands::Down { target } => {
            cli::down::run(target.config.as_deref(), target.overrides())?;
            Ok(ExitStatus::Success)
        }
        Commands::Status { target } => {
            cli::status::run(target.config.as_deref(), target.overrides())?;
            Ok(ExitStatus::Success)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let status = match dispatch(cli.command) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitStatus::ConfigError
        }
    };

    process::exit(status.code());
}
