//! Loader facade: assembles defaults, files and environment into a [`ZoneConfig`].

use super::merge::merge_policy;
use super::sources::{environment, zone_file};
use super::ZoneConfig;
use crate::error::ContextError;
use config::{Config, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Loads configuration with the documented precedence.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `dir`.
    ///
    /// Precedence (highest to lowest):
    /// 1. `CTXZONE__*` environment variables
    /// 2. `dir/ctxzone.{CTXZONE_ENV}.toml`
    /// 3. `dir/ctxzone.toml`
    /// 4. Defaults
    pub fn load(dir: &Path) -> Result<ZoneConfig, ContextError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = zone_file::add_to_builder(builder, dir)?;
        let builder = environment::add_to_builder(builder);
        let config: ZoneConfig = builder.build()?.try_deserialize()?;
        debug!(
            dir = %dir.display(),
            default_capabilities = ?config.context.default_capabilities,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load a single TOML file on top of the defaults, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<ZoneConfig, ContextError> {
        if !path.exists() {
            return Err(ContextError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Defaults only.
    pub fn defaults() -> Result<ZoneConfig, ContextError> {
        let config: Config = merge_policy::builder_with_defaults()?.build()?;
        Ok(config.try_deserialize()?)
    }
}
