//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `MICROBATCH_` and use double underscores
    /// for nested values. For example:
    /// - `MICROBATCH_QUEUE__BATCH_SIZE=32`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // The config crate doesn't apply serde defaults for missing sections
        let builder = set_config_default(builder, "queue.capacity", DEFAULT_CAPACITY as i64)?;
        let builder = set_config_default(builder, "queue.batch_size", DEFAULT_BATCH_SIZE as i64)?;
        let builder = set_config_default(
            builder,
            "queue.batch_timeout_ms",
            DEFAULT_BATCH_TIMEOUT_MS as i64,
        )?;
        let builder = set_config_default(
            builder,
            "bench.producers",
            DEFAULT_BENCH_PRODUCERS as i64,
        )?;
        let mut builder = set_config_default(
            builder,
            "bench.items_per_producer",
            DEFAULT_BENCH_ITEMS_PER_PRODUCER as i64,
        )?;

        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("MICROBATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.microbatch/config.toml or custom --config path)
    /// 3. Environment variables (MICROBATCH_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
