use thiserror::Error;

/// Errors raised by the pool itself, as opposed to its jobs.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every worker has exited, so the queue no longer accepts jobs.
    #[error("job queue closed")]
    ChannelClosed,

    /// A worker task panicked or was aborted.
    #[error("worker failed: {0}")]
    WorkerPanicked(String),
}

/// Outcome of a drained pool.
#[derive(Debug)]
pub struct PoolSummary<E> {
    /// Jobs that ran to completion without error.
    pub processed: usize,
    /// Jobs dropped because the pool was cancelled before they started.
    pub skipped: usize,
    /// Errors returned by jobs, in completion order.
    pub errors: Vec<E>,
}

impl<E> PoolSummary<E> {
    pub(crate) fn new() -> Self {
        PoolSummary {
            processed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn merge(&mut self, other: PoolSummary<E>) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}
