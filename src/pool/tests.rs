use crate::pool::{Config, ConfigBuilder, PoolError, Processor, WorkerPool};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    // Counts processed jobs
    struct CountingProcessor {
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Processor<usize> for CountingProcessor {
        type Error = String;

        async fn process(&self, _cancel: &CancellationToken, _job: usize) -> Result<(), String> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // Records jobs in completion order
    struct RecordingProcessor {
        seen: Arc<tokio::sync::Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl Processor<usize> for RecordingProcessor {
        type Error = String;

        async fn process(&self, _cancel: &CancellationToken, job: usize) -> Result<(), String> {
            self.seen.lock().await.push(job);
            Ok(())
        }
    }

    // Fails odd jobs
    struct OddFailProcessor;

    #[async_trait]
    impl Processor<usize> for OddFailProcessor {
        type Error = String;

        async fn process(&self, _cancel: &CancellationToken, job: usize) -> Result<(), String> {
            if job % 2 == 1 {
                return Err(format!("job {job} failed"));
            }
            Ok(())
        }
    }

    // Cancels the pool on the first job it sees
    struct CancellingProcessor {
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Processor<usize> for CancellingProcessor {
        type Error = String;

        async fn process(&self, cancel: &CancellationToken, _job: usize) -> Result<(), String> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            Err("stop".to_string())
        }
    }

    // Tracks how many jobs run at the same time
    struct ConcurrencyGauge {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Processor<usize> for ConcurrencyGauge {
        type Error = String;

        async fn process(&self, _cancel: &CancellationToken, _job: usize) -> Result<(), String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanicProcessor;

    #[async_trait]
    impl Processor<usize> for PanicProcessor {
        type Error = String;

        async fn process(&self, _cancel: &CancellationToken, _job: usize) -> Result<(), String> {
            panic!("processor panicked");
        }
    }

    fn config(worker_num: usize, queue_size: usize) -> Config {
        ConfigBuilder::default()
            .worker_num(worker_num)
            .queue_size(queue_size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ConfigBuilder::default().build().unwrap();
        assert_eq!(config.worker_num(), num_cpus::get());
        assert_eq!(config.queue_size(), num_cpus::get());

        let config = Config::default();
        assert_eq!(config.worker_num(), num_cpus::get());
    }

    #[tokio::test]
    async fn test_every_job_is_processed() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(
            &config(4, 2),
            &cancel,
            CountingProcessor {
                counter: counter.clone(),
            },
        );

        for job in 0..50 {
            pool.submit(job).await.unwrap();
        }
        let summary = pool.join().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(summary.processed, 50);
        assert_eq!(summary.skipped, 0);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_single_worker_preserves_order() {
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(
            &config(1, 1),
            &cancel,
            RecordingProcessor { seen: seen.clone() },
        );

        for job in 0..10 {
            pool.submit(job).await.unwrap();
        }
        pool.join().await.unwrap();

        assert_eq!(*seen.lock().await, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_errors_are_collected() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(&config(3, 3), &cancel, OddFailProcessor);

        for job in 0..6 {
            pool.submit(job).await.unwrap();
        }
        let summary = pool.join().await.unwrap();

        let mut errors = summary.errors;
        errors.sort();
        assert_eq!(errors, vec!["job 1 failed", "job 3 failed", "job 5 failed"]);
        assert_eq!(summary.processed, 3);
    }

    #[tokio::test]
    async fn test_cancelled_pool_skips_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(
            &config(1, 8),
            &cancel,
            CancellingProcessor {
                counter: counter.clone(),
            },
        );

        for job in 0..5 {
            pool.submit(job).await.unwrap();
        }
        let summary = pool.join().await.unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.skipped, 4);
    }

    #[tokio::test]
    async fn test_worker_num_bounds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(
            &config(2, 2),
            &cancel,
            ConcurrencyGauge {
                running: running.clone(),
                peak: peak.clone(),
            },
        );

        for job in 0..8 {
            pool.submit(job).await.unwrap();
        }
        pool.join().await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::start(&config(1, 1), &cancel, PanicProcessor);

        pool.submit(0).await.unwrap();
        let err = pool.join().await.unwrap_err();
        assert!(matches!(err, PoolError::WorkerPanicked(_)));
    }

    #[tokio::test]
    async fn test_join_without_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let pool: WorkerPool<usize, String> = WorkerPool::start(
            &config(2, 2),
            &cancel,
            CountingProcessor {
                counter: counter.clone(),
            },
        );

        let summary = pool.join().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
