mod config;
mod put;
mod status;

pub use config::ConfigCommand;
pub use put::PutArgs;

pub use config::handle_config;
pub use put::handle_put;
pub use status::handle_status;

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::Config;

/// Load `--config` when given, otherwise the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}
