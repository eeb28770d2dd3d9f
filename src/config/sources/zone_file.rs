//! Config file sources: ctxzone.toml and ctxzone.{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::{File, FileFormat};
use std::path::Path;
use tracing::debug;

pub const BASE_FILE: &str = "ctxzone.toml";

/// Name of the environment-specific file for the current `CTXZONE_ENV`.
pub fn env_file_name() -> Option<String> {
    std::env::var("CTXZONE_ENV")
        .ok()
        .filter(|env| !env.trim().is_empty())
        .map(|env| format!("ctxzone.{}.toml", env.trim()))
}

/// Add config files found in `dir` to the builder.
/// Precedence: ctxzone.toml (base) then ctxzone.{CTXZONE_ENV}.toml (env-specific).
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut candidates = vec![dir.join(BASE_FILE)];
    if let Some(name) = env_file_name() {
        candidates.push(dir.join(name));
    }

    for path in candidates {
        if path.exists() {
            debug!(config_path = %path.display(), "adding config file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
    }

    Ok(builder)
}
