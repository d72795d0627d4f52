//! The batching state machine
//!
//! A single dispatcher task owns the open batch and its timer. It pulls items
//! from the input buffer, seals a batch when it reaches the batch size or when
//! the batch timeout elapses, and hands sealed batches to the output stream.
//!
//! States:
//! - **Idle**: the open batch is empty and the timer is disarmed
//! - **Accumulating**: the open batch is non-empty and the timer is armed from
//!   the arrival of its first item
//!
//! Only emissions rearm or disarm the timer; individual arrivals never push
//! the deadline back.

use crate::batch::{Batch, FlushTrigger};
use crate::stats::Counters;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Upper bound on the capacity reserved up front for a fresh batch
const MAX_PREALLOCATED_ITEMS: usize = 1024;

/// Roughly 30 years; deadlines that would overflow `Instant` are clamped here
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline for a batch opened now
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Sequential worker owning all batching state
pub(crate) struct Dispatcher<T> {
    /// Size-trigger threshold
    batch_size: usize,
    /// Maximum age of a non-empty batch
    batch_timeout: Duration,
    /// Input buffer receiving producer items
    input_rx: mpsc::Receiver<T>,
    /// Output stream for sealed batches
    output_tx: mpsc::Sender<Batch<T>>,
    /// Counters observed from outside the task
    counters: Arc<Counters>,
    /// Cancelled when the queue closes
    shutdown: CancellationToken,
    /// The open batch
    batch: Vec<T>,
}

impl<T: Send + 'static> Dispatcher<T> {
    pub(crate) fn new(
        batch_size: usize,
        batch_timeout: Duration,
        input_rx: mpsc::Receiver<T>,
        output_tx: mpsc::Sender<Batch<T>>,
        counters: Arc<Counters>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            batch_size,
            batch_timeout,
            input_rx,
            output_tx,
            counters,
            shutdown,
            batch: Self::fresh_batch(batch_size),
        }
    }

    fn fresh_batch(batch_size: usize) -> Vec<T> {
        Vec::with_capacity(batch_size.min(MAX_PREALLOCATED_ITEMS))
    }

    /// Run until the queue closes or the consumer goes away
    pub(crate) async fn run(mut self) {
        // One timer for the whole lifetime; rearming resets it in place so a
        // stale deadline can never fire after a new one is set.
        let timer = sleep(self.batch_timeout);
        tokio::pin!(timer);
        let mut armed = false;

        debug!(
            "Dispatcher started (batch_size={}, batch_timeout={:?})",
            self.batch_size, self.batch_timeout
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("Dispatcher received shutdown with {} pending items", self.batch.len());
                    break;
                }
                () = &mut timer, if armed => {
                    armed = false;
                    if self.batch.is_empty() {
                        trace!("Batch timer fired while idle");
                        continue;
                    }
                    if !self.emit(FlushTrigger::Timeout).await {
                        return;
                    }
                }
                maybe_item = self.input_rx.recv() => {
                    let Some(item) = maybe_item else {
                        debug!("Input buffer closed");
                        break;
                    };
                    self.batch.push(item);
                    trace!("Accumulated item ({}/{})", self.batch.len(), self.batch_size);

                    if self.batch.len() >= self.batch_size {
                        armed = false;
                        if !self.emit(FlushTrigger::Size).await {
                            return;
                        }
                    } else if self.batch.len() == 1 {
                        timer.as_mut().reset(deadline_after(self.batch_timeout));
                        armed = true;
                    }
                }
            }
        }

        self.drain_and_flush().await;
        debug!("Dispatcher stopped");
    }

    /// Seal everything already accepted into the input buffer, then flush the
    /// remainder as a final partial batch.
    async fn drain_and_flush(&mut self) {
        self.input_rx.close();

        while let Some(item) = self.input_rx.recv().await {
            self.batch.push(item);
            if self.batch.len() >= self.batch_size && !self.emit(FlushTrigger::Size).await {
                return;
            }
        }

        if !self.batch.is_empty() {
            self.emit(FlushTrigger::Close).await;
        }
    }

    /// Seal the open batch and deliver it, waiting for the consumer to accept.
    ///
    /// Returns false when the consumer has gone away.
    async fn emit(&mut self, trigger: FlushTrigger) -> bool {
        let items = std::mem::replace(&mut self.batch, Self::fresh_batch(self.batch_size));
        let len = items.len();
        self.counters.record(trigger, len);
        debug!("Flushing batch of {} items ({})", len, trigger);

        if self.output_tx.send(Batch::new(items, trigger)).await.is_err() {
            debug!("Batch consumer dropped, stopping dispatcher");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Harness {
        input_tx: mpsc::Sender<u32>,
        output_rx: mpsc::Receiver<Batch<u32>>,
        counters: Arc<Counters>,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_dispatcher(batch_size: usize, batch_timeout: Duration) -> Harness {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (output_tx, output_rx) = mpsc::channel(1);
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
        let handle = tokio::spawn(dispatcher.run());

        Harness {
            input_tx,
            output_rx,
            counters,
            shutdown,
            handle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_disarms_timer() {
        let mut h = spawn_dispatcher(3, Duration::from_secs(1));

        for i in 0..3 {
            h.input_tx.send(i).await.expect("test setup failed");
        }
        let batch = h.output_rx.recv().await.expect("batch expected");
        assert_eq!(batch.items(), &[0, 1, 2]);
        assert_eq!(batch.trigger(), FlushTrigger::Size);

        // Nothing pending, so letting the old deadline pass must not emit
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.output_rx.try_recv().is_err());
        assert_eq!(h.counters.num_timeouts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_armed_by_first_item_only() {
        let mut h = spawn_dispatcher(10, Duration::from_millis(100));
        let start = Instant::now();

        h.input_tx.send(1).await.expect("test setup failed");
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.input_tx.send(2).await.expect("test setup failed");

        let batch = h.output_rx.recv().await.expect("batch expected");
        assert_eq!(batch.items(), &[1, 2]);
        assert_eq!(batch.trigger(), FlushTrigger::Timeout);
        // The second arrival did not push the deadline out
        assert!(start.elapsed() < Duration::from_millis(150));
        assert_eq!(h.counters.num_timeouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_dispatcher_never_emits() {
        let mut h = spawn_dispatcher(2, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.output_rx.try_recv().is_err());
        assert_eq!(h.counters.snapshot().batches_emitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_buffered_items() {
        let mut h = spawn_dispatcher(2, Duration::from_secs(60));

        // Fill the input buffer before the dispatcher gets a chance to run
        for i in 0..5 {
            h.input_tx.try_send(i).expect("test setup failed");
        }
        h.shutdown.cancel();

        let mut received = Vec::new();
        while let Some(batch) = h.output_rx.recv().await {
            received.push((batch.trigger(), batch.into_items()));
        }

        assert_eq!(
            received,
            vec![
                (FlushTrigger::Size, vec![0, 1]),
                (FlushTrigger::Size, vec![2, 3]),
                (FlushTrigger::Close, vec![4]),
            ]
        );
        h.handle.await.expect("dispatcher panicked");
        assert!(h.input_tx.send(9).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_only_flushes_on_size() {
        let mut h = spawn_dispatcher(2, Duration::MAX);

        h.input_tx.send(1).await.expect("test setup failed");
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(h.output_rx.try_recv().is_err());
        assert!(!h.handle.is_finished());

        h.input_tx.send(2).await.expect("test setup failed");
        let batch = h.output_rx.recv().await.expect("batch expected");
        assert_eq!(batch.items(), &[1, 2]);
        assert_eq!(batch.trigger(), FlushTrigger::Size);
        assert_eq!(h.counters.num_timeouts(), 0);
    }

    #[test]
    fn test_deadline_after_clamps_overflow() {
        let now = Instant::now();
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline >= now + FAR_FUTURE);
        assert!(deadline_after(Duration::from_millis(5)) < now + Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_stops_when_consumer_dropped() {
        let h = spawn_dispatcher(1, Duration::from_secs(60));
        drop(h.output_rx);

        // First item is sealed and the failed delivery stops the task
        h.input_tx.send(1).await.expect("test setup failed");
        h.handle.await.expect("dispatcher panicked");
        assert!(h.input_tx.is_closed());
    }
}
