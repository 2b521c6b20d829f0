// Library interface for testenv
// The binary is a thin clap layer over these modules

pub mod cli;
pub mod clock;
pub mod config;
pub mod docker;
pub mod errors;
pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod signals;
pub mod suite;
