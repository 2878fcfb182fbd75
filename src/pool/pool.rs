use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::processor::Processor;
use super::types::{PoolError, PoolSummary};

/// Fixed number of workers fed from one bounded queue.
///
/// [`WorkerPool::submit`] waits while the queue is full, which is what bounds
/// how far a producer can run ahead of the workers. [`WorkerPool::join`]
/// closes the queue and waits for every worker to finish.
pub struct WorkerPool<T, E> {
    sender: mpsc::Sender<T>,
    workers: Vec<JoinHandle<PoolSummary<E>>>,
}

impl<T, E> WorkerPool<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn start<P>(config: &Config, cancel: &CancellationToken, processor: P) -> Self
    where
        P: Processor<T, Error = E> + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_size.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let processor = Arc::new(processor);

        let workers = (0..config.worker_num.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let processor = Arc::clone(&processor);
                let cancel = cancel.clone();
                tokio::spawn(async move { Self::worker(worker_id, receiver, processor, cancel).await })
            })
            .collect();

        WorkerPool { sender, workers }
    }

    /// Queues a job, waiting for room if the queue is full.
    pub async fn submit(&self, job: T) -> Result<(), PoolError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| PoolError::ChannelClosed)
    }

    /// Closes the queue and waits for the workers to drain it.
    pub async fn join(self) -> Result<PoolSummary<E>, PoolError> {
        let WorkerPool { sender, workers } = self;
        drop(sender);

        let mut summary = PoolSummary::new();
        let mut panicked = None;
        for handle in workers {
            match handle.await {
                Ok(report) => summary.merge(report),
                Err(e) => panicked = Some(PoolError::WorkerPanicked(e.to_string())),
            }
        }

        match panicked {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    async fn worker<P>(
        worker_id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<T>>>,
        processor: Arc<P>,
        cancel: CancellationToken,
    ) -> PoolSummary<E>
    where
        P: Processor<T, Error = E>,
    {
        let mut report = PoolSummary::new();
        loop {
            let job = {
                let mut rx = receiver.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                tracing::debug!(worker_id, "job queue closed");
                break;
            };

            // keep draining after cancellation so producers never block
            if cancel.is_cancelled() {
                report.skipped += 1;
                continue;
            }
            match processor.process(&cancel, job).await {
                Ok(()) => report.processed += 1,
                Err(e) => report.errors.push(e),
            }
        }
        report
    }
}
