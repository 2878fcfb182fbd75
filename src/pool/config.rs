use derive_builder::Builder;

/// Sizing of a [`super::WorkerPool`].
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct Config {
    /// Number of jobs that may wait for a worker before `submit` blocks
    #[builder(default = "num_cpus::get()")]
    pub(crate) queue_size: usize,

    /// Number of concurrent worker tasks
    #[builder(default = "num_cpus::get()")]
    pub(crate) worker_num: usize,
}

impl Config {
    /// Returns the job queue capacity
    #[inline]
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Returns the number of worker tasks
    #[inline]
    pub fn worker_num(&self) -> usize {
        self.worker_num
    }
}

impl Default for Config {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Config {
            queue_size: cpus,
            worker_num: cpus,
        }
    }
}
