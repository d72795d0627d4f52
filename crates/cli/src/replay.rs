//! Replay a line-oriented statement log through a queue
//!
//! Each non-blank input line becomes one item. Blank lines are submitted as
//! absent items, which the queue ignores. Every sealed batch is written out as
//! a single JSON line.

use anyhow::{Context, Result};
use microbatch_core::config::QueueConfig;
use microbatch_queue::{Batch, Queue};
use serde::Serialize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

/// Totals for a finished replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    /// Lines read from the input
    pub lines: u64,
    /// Items delivered in batches
    pub items: u64,
    /// Batches written to the output
    pub batches: u64,
    /// Batches sealed by the batch timeout
    pub num_timeouts: u64,
}

#[derive(Serialize)]
struct BatchRecord<'a> {
    seq: u64,
    trigger: &'static str,
    items: &'a [String],
}

/// Feed `input` through a queue built from `config`, writing batches to `output`
pub async fn replay<R, W>(input: R, output: &mut W, config: &QueueConfig) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let queue: Queue<String> = Queue::with_config(config).context("Failed to create queue")?;

    let produce = async {
        let result = feed_lines(input, &queue).await;
        // Close even on read errors so the consumer sees the end of the stream
        queue.close().await;
        result
    };

    let consume = async {
        let mut seq = 0u64;
        let mut written = Ok(());
        // Keep draining after an output error; close waits on the consumer
        while let Some(batch) = queue.next_batch().await {
            if written.is_ok() {
                seq += 1;
                written = write_batch(output, seq, &batch);
            }
        }
        written?;
        output.flush().context("Failed to flush output")?;
        Ok::<_, anyhow::Error>(seq)
    };

    let (lines, batches) = tokio::join!(produce, consume);
    let lines = lines?;
    let batches = batches?;

    let stats = queue.stats();
    let summary = ReplaySummary {
        lines,
        items: stats.items_emitted,
        batches,
        num_timeouts: stats.num_timeouts,
    };
    info!(
        "Replayed {} lines into {} batches ({} timeouts)",
        summary.lines, summary.batches, summary.num_timeouts
    );
    Ok(summary)
}

async fn feed_lines<R>(input: R, queue: &Queue<String>) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        count += 1;
        let item = if line.trim().is_empty() {
            debug!("Skipping blank line {count}");
            None
        } else {
            Some(line)
        };
        queue
            .write(item)
            .await
            .with_context(|| format!("Failed to enqueue line {count}"))?;
    }

    Ok(count)
}

fn write_batch<W: Write>(output: &mut W, seq: u64, batch: &Batch<String>) -> Result<()> {
    let record = BatchRecord {
        seq,
        trigger: batch.trigger().as_str(),
        items: batch.items(),
    };
    serde_json::to_writer(&mut *output, &record).context("Failed to encode batch")?;
    writeln!(output).context("Failed to write batch")?;
    Ok(())
}
