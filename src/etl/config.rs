use std::fmt;
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::types::ETLError;
use crate::pool;

/// Whether a transaction pages its extract phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchControl {
    Enable,
    #[default]
    Disable,
}

impl BatchControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchControl::Enable => "enable",
            BatchControl::Disable => "disable",
        }
    }
}

impl fmt::Display for BatchControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchControl {
    type Err = ETLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enable" => Ok(BatchControl::Enable),
            "disable" => Ok(BatchControl::Disable),
            other => Err(ETLError::Configuration(format!(
                "batch control must be 'enable' or 'disable', got '{other}'"
            ))),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Options applied when a [`super::Transaction`] is opened.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct TransactionConfig {
    /// Page the extract phase and run transform+load per batch
    #[builder(default)]
    #[serde(rename = "batch_control", default)]
    pub(crate) batch: BatchControl,

    /// Rows per extract page; must be positive when batching is enabled
    #[builder(default)]
    #[serde(default)]
    pub(crate) batch_size: u64,

    /// Number of batch workers
    #[builder(default = "num_cpus::get()")]
    #[serde(default = "default_workers")]
    pub(crate) worker_num: usize,

    /// Extracted batches that may wait for a worker; defaults to `worker_num`
    #[builder(default)]
    #[serde(default)]
    pub(crate) queue_size: Option<usize>,
}

impl TransactionConfig {
    /// Batching enabled with `batch_size` rows per page.
    pub fn batched(batch_size: u64) -> Self {
        TransactionConfig {
            batch: BatchControl::Enable,
            batch_size,
            ..Self::default()
        }
    }

    #[inline]
    pub fn batch(&self) -> BatchControl {
        self.batch
    }

    #[inline]
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    #[inline]
    pub fn worker_num(&self) -> usize {
        self.worker_num
    }

    #[inline]
    pub fn queue_size(&self) -> usize {
        self.queue_size.unwrap_or(self.worker_num)
    }

    pub fn is_batched(&self) -> bool {
        self.batch == BatchControl::Enable
    }

    pub(crate) fn validate(&self) -> Result<(), ETLError> {
        if self.is_batched() && self.batch_size == 0 {
            return Err(ETLError::Configuration(
                "batch size must be positive when batching is enabled".to_string(),
            ));
        }
        if self.worker_num == 0 {
            return Err(ETLError::Configuration(
                "worker_num must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn pool_config(&self) -> pool::Config {
        pool::Config {
            queue_size: self.queue_size(),
            worker_num: self.worker_num,
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        TransactionConfig {
            batch: BatchControl::Disable,
            batch_size: 0,
            worker_num: default_workers(),
            queue_size: None,
        }
    }
}
