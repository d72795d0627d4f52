//! Library interface for the microbatch CLI
//!
//! This module exposes the command implementations for integration testing
//! while keeping argument parsing in main.rs.

pub mod bench;
pub mod replay;

pub use bench::{run_bench, BenchReport};
pub use replay::{replay, ReplaySummary};

// Re-export commonly needed types for tests
pub use anyhow::Result;
pub use microbatch_core::config::{BenchConfig, Config, QueueConfig};
