// Command handlers behind the `testenv` binary

pub mod down;
pub mod run;
pub mod status;

use crate::config::{Config, Overrides};
use crate::errors::Result;
use std::env;
use std::path::Path;

/// Load config from `path` (or `.testenv.yml` in the current directory),
/// apply command-line overrides and validate the result
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<Config> {
    let cwd = env::current_dir()?;
    let mut config = Config::load(&cwd, path)?;
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}
