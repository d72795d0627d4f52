//! Configuration module for the microbatch system
//!
//! This module provides configuration structures and loading mechanisms for
//! queues and the command-line front end. Configuration can be loaded from TOML
//! files and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.microbatch/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".microbatch").join("config.toml"))
}

/// Checks the three queue settings, failing on the first non-positive one
///
/// Shared by [`QueueConfig::validate`] and queue constructors that take the
/// settings directly.
pub fn validate_queue_settings(
    capacity: usize,
    batch_size: usize,
    batch_timeout: Duration,
) -> Result<()> {
    if capacity == 0 {
        return Err(Error::invalid_config("capacity must be greater than 0"));
    }
    if batch_size == 0 {
        return Err(Error::invalid_config("batch_size must be greater than 0"));
    }
    if batch_timeout.is_zero() {
        return Err(Error::invalid_config(
            "batch_timeout must be greater than 0",
        ));
    }
    Ok(())
}

/// Immutable configuration for a batching queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Depth of the input buffer; writers wait when it is full
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum items per emitted batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum time a non-empty batch waits before being flushed, in milliseconds
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

impl QueueConfig {
    /// Create configuration from builder
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Get the batch timeout duration
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Validate that every setting is positive
    pub fn validate(&self) -> Result<()> {
        validate_queue_settings(self.capacity, self.batch_size, self.batch_timeout())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
        }
    }
}

/// Builder for QueueConfig
#[derive(Debug, Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    /// Set input buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set batch timeout in milliseconds
    pub fn batch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.batch_timeout_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> QueueConfig {
        self.config
    }
}

/// Settings for the `bench` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Number of concurrent producers
    #[serde(default = "default_bench_producers")]
    pub producers: usize,

    /// Items written by each producer
    #[serde(default = "default_bench_items_per_producer")]
    pub items_per_producer: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            producers: default_bench_producers(),
            items_per_producer: default_bench_items_per_producer(),
        }
    }
}

/// Main configuration structure for the microbatch system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Benchmark configuration
    #[serde(default)]
    pub bench: BenchConfig,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        self.queue.validate()?;

        if self.bench.producers == 0 {
            return Err(Error::config(
                "bench.producers must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Serializes the configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))
    }
}
