use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tessera_core::Config;

/// Loads configuration from an optional TOML file, then the environment.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?,
        None => Config::default_config(),
    };

    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

/// Returns the value of `--config <path>`, if given.
pub fn parse_config_path(args: &[String]) -> Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }

    Ok(None)
}
