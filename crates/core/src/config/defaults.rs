//! Default values and functions for configuration

pub(crate) const DEFAULT_CAPACITY: usize = 1024;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 16;
pub(crate) const DEFAULT_BATCH_TIMEOUT_MS: u64 = 50;
pub(crate) const DEFAULT_BENCH_PRODUCERS: usize = 4;
pub(crate) const DEFAULT_BENCH_ITEMS_PER_PRODUCER: usize = 10_000;

pub(crate) fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

pub(crate) fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

pub(crate) fn default_batch_timeout_ms() -> u64 {
    DEFAULT_BATCH_TIMEOUT_MS
}

pub(crate) fn default_bench_producers() -> usize {
    DEFAULT_BENCH_PRODUCERS
}

pub(crate) fn default_bench_items_per_producer() -> usize {
    DEFAULT_BENCH_ITEMS_PER_PRODUCER
}
