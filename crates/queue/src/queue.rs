//! Public queue handle
//!
//! The [`Queue`] bundles the bounded input buffer, the dispatcher task, the
//! output stream of sealed batches and the diagnostic counters.

use crate::batch::Batch;
use crate::dispatcher::Dispatcher;
use crate::stats::{Counters, QueueStats};
use microbatch_core::config::{validate_queue_settings, QueueConfig};
use microbatch_core::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Capacity of the output stream; the dispatcher waits for the consumer
/// before sealing anything further
const OUTPUT_CAPACITY: usize = 1;

/// Micro-batching queue
///
/// Producers call [`write`](Queue::write) concurrently; a single consumer reads
/// sealed batches with [`next_batch`](Queue::next_batch). A batch is sealed when
/// it reaches `batch_size` items, when `batch_timeout` elapses after its first
/// item arrived, or when the queue is closed.
pub struct Queue<T> {
    capacity: usize,
    batch_size: usize,
    batch_timeout: Duration,
    input_tx: mpsc::Sender<T>,
    batches: Mutex<mpsc::Receiver<Batch<T>>>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Queue<T> {
    /// Create a queue and start its dispatcher
    ///
    /// Fails with [`Error::InvalidConfig`] if any setting is zero, and without
    /// allocating anything when called outside a tokio runtime.
    pub fn new(capacity: usize, batch_size: usize, batch_timeout: Duration) -> Result<Self> {
        validate_queue_settings(capacity, batch_size, batch_timeout)?;
        if capacity > Semaphore::MAX_PERMITS {
            return Err(Error::invalid_config(format!(
                "capacity too large (max {}, got {capacity})",
                Semaphore::MAX_PERMITS
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::with_context("Queue must be created inside a tokio runtime", e))?;

        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        let counters = Arc::new(Counters::default());
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            batch_size,
            batch_timeout,
            input_rx,
            output_tx,
            Arc::clone(&counters),
            shutdown.clone(),
        );
        let handle = runtime.spawn(dispatcher.run());

        debug!(
            "Created queue (capacity={capacity}, batch_size={batch_size}, batch_timeout={batch_timeout:?})"
        );

        Ok(Self {
            capacity,
            batch_size,
            batch_timeout,
            input_tx,
            batches: Mutex::new(output_rx),
            counters,
            shutdown,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Create a queue from a validated configuration
    pub fn with_config(config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.capacity, config.batch_size, config.batch_timeout())
    }

    /// Submit an item
    ///
    /// An absent item (`None`) is accepted as a no-op and never reaches a batch.
    /// Otherwise waits while the input buffer is full, and fails with
    /// [`Error::Closed`] once [`close`](Queue::close) has begun.
    pub async fn write(&self, item: impl Into<Option<T>>) -> Result<()> {
        let Some(item) = item.into() else {
            trace!("Ignoring absent item");
            return Ok(());
        };

        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }

        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Err(Error::Closed),
            sent = self.input_tx.send(item) => sent.map_err(|_| Error::Closed),
        }
    }

    /// Wait for the next sealed batch
    ///
    /// Returns `None` once the queue has closed and every batch has been
    /// delivered. Concurrent callers are served one at a time.
    pub async fn next_batch(&self) -> Option<Batch<T>> {
        self.batches.lock().await.recv().await
    }

    /// Take a sealed batch if one is ready, without waiting
    pub fn try_next_batch(&self) -> Option<Batch<T>> {
        self.batches.try_lock().ok()?.try_recv().ok()
    }

    /// Stop accepting writes, flush pending items and stop the dispatcher
    ///
    /// Items already accepted into the input buffer are still batched and
    /// delivered, followed by the open partial batch. Waits until the
    /// dispatcher has finished, so the consumer must keep reading batches
    /// while the queue closes. Safe to call repeatedly and concurrently.
    pub async fn close(&self) {
        self.shutdown.cancel();

        let mut dispatcher = self.dispatcher.lock().await;
        if let Some(handle) = dispatcher.take() {
            if let Err(e) = handle.await {
                warn!("Dispatcher task failed: {e}");
            }
            debug!("Queue closed");
        }
    }

    /// Whether [`close`](Queue::close) has begun
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of batches sealed because the batch timeout elapsed
    pub fn num_timeouts(&self) -> u64 {
        self.counters.num_timeouts()
    }

    /// Snapshot of all diagnostic counters
    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// Input buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Maximum items per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Maximum age of a non-empty batch
    pub fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // The output receiver is dropped with the queue, so the dispatcher
        // exits as soon as it tries to deliver anything further.
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_new_rejects_invalid_settings() {
        for (capacity, batch_size, timeout) in [
            (0, 1, Duration::from_millis(100)),
            (1, 0, Duration::from_millis(100)),
            (1, 1, Duration::ZERO),
        ] {
            let result = Queue::<u32>::new(capacity, batch_size, timeout);
            assert!(matches!(result, Err(Error::InvalidConfig(_))));
        }
    }

    #[tokio::test]
    async fn test_new_rejects_oversized_capacity() {
        let result = Queue::<u32>::new(usize::MAX, 1, Duration::from_secs(1));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = Queue::<u32>::new(1, 1, Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_with_config() {
        let config = QueueConfig::builder()
            .capacity(8)
            .batch_size(2)
            .batch_timeout_ms(250)
            .build();
        let queue = Queue::<u32>::with_config(&config).expect("valid config");

        assert_eq!(queue.capacity(), 8);
        assert_eq!(queue.batch_size(), 2);
        assert_eq!(queue.batch_timeout(), Duration::from_millis(250));
        queue.close().await;

        let bad = QueueConfig::builder().batch_size(0).build();
        assert!(matches!(
            Queue::<u32>::with_config(&bad),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_write_none_is_noop() {
        let queue = Queue::<u32>::new(1, 1, Duration::from_secs(60)).expect("valid config");

        queue.write(None::<u32>).await.expect("absent item accepted");
        assert!(queue.try_next_batch().is_none());
        assert_eq!(queue.stats(), QueueStats::default());
        queue.close().await;
    }

    #[tokio::test]
    async fn test_close_marks_queue_closed() {
        let queue = Queue::<u32>::new(4, 2, Duration::from_secs(60)).expect("valid config");
        assert!(!queue.is_closed());

        queue.close().await;
        assert!(queue.is_closed());
        assert!(queue.write(1u32).await.unwrap_err().is_closed());
        // Absent items stay a no-op even after close
        assert!(queue.write(None::<u32>).await.is_ok());
        assert!(queue.next_batch().await.is_none());
    }
}
