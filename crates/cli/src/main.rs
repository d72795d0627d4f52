//! microbatch CLI - drive a micro-batching queue from the command line
//!
//! This binary replays statement logs through a queue, benchmarks concurrent
//! producers, and prints the effective configuration.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use microbatch::{replay, run_bench};
use microbatch_core::config::{Config, QueueConfig};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "microbatch")]
#[command(about = "Coalesce writes into size- and time-bounded batches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Batch lines from a file (or stdin) and print each batch as JSON
    Replay {
        /// Input file, one item per line (defaults to stdin)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        #[command(flatten)]
        queue: QueueOverrides,
    },
    /// Measure batching throughput with concurrent producers
    Bench {
        /// Number of concurrent producers
        #[arg(long)]
        producers: Option<usize>,

        /// Items written by each producer
        #[arg(long)]
        items: Option<usize>,

        #[command(flatten)]
        queue: QueueOverrides,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Command-line overrides for queue settings
#[derive(Args, Debug, Default)]
struct QueueOverrides {
    /// Input buffer capacity
    #[arg(long)]
    capacity: Option<usize>,

    /// Maximum items per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Batch timeout in milliseconds
    #[arg(long)]
    batch_timeout_ms: Option<u64>,
}

impl QueueOverrides {
    fn apply(&self, config: &mut QueueConfig) {
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(ms) = self.batch_timeout_ms {
            config.batch_timeout_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Replay { input, queue }) => {
            queue.apply(&mut config.queue);
            run_replay(input.as_deref(), &config).await
        }
        Some(Commands::Bench {
            producers,
            items,
            queue,
        }) => {
            queue.apply(&mut config.queue);
            if let Some(producers) = producers {
                config.bench.producers = producers;
            }
            if let Some(items) = items {
                config.bench.items_per_producer = items;
            }
            config.validate()?;

            let report = run_bench(&config.queue, &config.bench).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.in_order {
                anyhow::bail!("items were delivered out of order");
            }
            Ok(())
        }
        Some(Commands::Config) => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        None => {
            println!("Run 'microbatch replay' to batch stdin, or --help for more options");
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    // Logs go to stderr so batch output on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "microbatch={level},microbatch_queue={level},microbatch_core={level}"
                ))
            }),
        )
        .init();

    Ok(())
}

async fn run_replay(input: Option<&Path>, config: &Config) -> Result<()> {
    config.queue.validate()?;
    let mut stdout = std::io::stdout().lock();

    let summary = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            replay(BufReader::new(file), &mut stdout, &config.queue).await?
        }
        None => replay(BufReader::new(tokio::io::stdin()), &mut stdout, &config.queue).await?,
    };

    info!(
        "{} items delivered in {} batches",
        summary.items, summary.batches
    );
    Ok(())
}
