use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Work performed by the pool for each submitted job.
///
/// `cancel` is shared by every worker of the pool; a processor may cancel it
/// to stop the remaining queued jobs from running.
#[async_trait]
pub trait Processor<T: Send>: Send + Sync {
    type Error: Send + 'static;

    async fn process(&self, cancel: &CancellationToken, job: T) -> Result<(), Self::Error>;
}
