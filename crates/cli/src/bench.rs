//! Throughput benchmark with concurrent producers
//!
//! Each producer writes a numbered sequence of items; a single consumer drains
//! batches and checks that every producer's items arrive in order.

use anyhow::{bail, Context, Result};
use microbatch_core::config::{BenchConfig, QueueConfig};
use microbatch_queue::Queue;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Item written by the benchmark: (producer index, sequence number)
type BenchItem = (usize, usize);

/// Outcome of a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchReport {
    pub producers: usize,
    pub items: u64,
    pub batches: u64,
    pub num_timeouts: u64,
    pub mean_batch_size: f64,
    pub elapsed_ms: u128,
    pub items_per_sec: f64,
    /// Whether every producer's items were received in submission order
    pub in_order: bool,
}

/// Run the benchmark
pub async fn run_bench(queue_config: &QueueConfig, bench: &BenchConfig) -> Result<BenchReport> {
    if bench.producers == 0 {
        bail!("bench needs at least one producer");
    }

    let queue: Arc<Queue<BenchItem>> =
        Arc::new(Queue::with_config(queue_config).context("Failed to create queue")?);
    let start = Instant::now();

    info!(
        "Starting bench: {} producers x {} items (batch_size={}, batch_timeout={:?})",
        bench.producers,
        bench.items_per_producer,
        queue.batch_size(),
        queue.batch_timeout()
    );

    let consumer = tokio::spawn({
        let queue = Arc::clone(&queue);
        let producers = bench.producers;
        async move {
            let mut next_expected = vec![0usize; producers];
            let mut in_order = true;
            while let Some(batch) = queue.next_batch().await {
                for (producer, seq) in batch {
                    if next_expected[producer] != seq {
                        in_order = false;
                    }
                    next_expected[producer] = seq + 1;
                }
            }
            in_order
        }
    });

    let mut producers = Vec::with_capacity(bench.producers);
    for producer in 0..bench.producers {
        let queue = Arc::clone(&queue);
        let items = bench.items_per_producer;
        producers.push(tokio::spawn(async move {
            for seq in 0..items {
                queue.write((producer, seq)).await?;
            }
            debug!("Producer {producer} finished");
            Ok::<_, microbatch_queue::Error>(())
        }));
    }

    let mut produce_result = Ok(());
    for handle in producers {
        let result = handle
            .await
            .context("Producer task panicked")
            .and_then(|r| r.context("Producer failed"));
        if produce_result.is_ok() {
            produce_result = result;
        }
    }

    queue.close().await;
    let in_order = consumer.await.context("Consumer task panicked")?;
    produce_result?;

    let elapsed = start.elapsed();
    let stats = queue.stats();
    let report = BenchReport {
        producers: bench.producers,
        items: stats.items_emitted,
        batches: stats.batches_emitted,
        num_timeouts: stats.num_timeouts,
        mean_batch_size: stats.mean_batch_size(),
        elapsed_ms: elapsed.as_millis(),
        items_per_sec: rate(stats.items_emitted, elapsed),
        in_order,
    };

    info!(
        "Bench finished: {} items in {} batches ({:.1} per batch, {} timeouts) in {:?}",
        report.items, report.batches, report.mean_batch_size, report.num_timeouts, elapsed
    );
    Ok(report)
}

fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    count as f64 / secs
}
