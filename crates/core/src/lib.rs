//! Core types for the microbatch system
//!
//! This crate provides the foundational pieces shared by the queue and the
//! command-line front end:
//!
//! - **Configuration**: queue and benchmark settings, layered loading
//! - **Error handling**: unified error types
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{validate_queue_settings, BenchConfig, Config, QueueConfig};
pub use error::{Error, Result};
