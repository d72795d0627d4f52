#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Micro-batching queue
//!
//! This crate coalesces a stream of items from many producers into bounded
//! batches delivered, one at a time, to a single consumer:
//! - Size-triggered flushes once a batch reaches `batch_size`
//! - Timeout-triggered flushes once a non-empty batch is `batch_timeout` old
//! - Backpressure on producers through a bounded input buffer
//! - Flush-on-close so no accepted item is dropped
//!
//! # Example
//!
//! ```no_run
//! use microbatch_queue::Queue;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue: Queue<String> = Queue::new(1024, 16, Duration::from_millis(50))?;
//!
//! queue.write("INSERT INTO foo VALUES (1)".to_string()).await?;
//!
//! if let Some(batch) = queue.next_batch().await {
//!     println!("{} statements ({})", batch.len(), batch.trigger());
//! }
//!
//! // Closing waits until every remaining batch is taken, so keep reading
//! // while the queue closes.
//! let drain = async {
//!     while let Some(batch) = queue.next_batch().await {
//!         println!("{} statements ({})", batch.len(), batch.trigger());
//!     }
//! };
//! tokio::join!(queue.close(), drain);
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod batch;
mod dispatcher;
mod queue;
mod stats;

// Public exports - minimal API surface
pub use batch::{Batch, FlushTrigger};
pub use microbatch_core::error::{Error, Result};
pub use queue::Queue;
pub use stats::QueueStats;
