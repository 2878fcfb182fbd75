//! Driver contracts.
//!
//! A driver is a named factory registered for one [`Domain`]. Opening it with
//! a data-source descriptor yields a handle for one phase of one transaction.
//! The descriptor grammar (DSN, file path, ...) belongs entirely to the
//! driver.
//!
//! # Handles
//!
//! - [`Extract`] is owned by the transaction's control loop, which pages it
//!   with [`Extract::set_batch`] before every query.
//! - [`Transform`] and [`Load`] are shared by the batch workers, so their
//!   methods take `&self` and they must be `Send + Sync`.
//!
//! Each handle turns a slice of [`Command`]s into its own [`Argument`] and
//! receives that argument back for execution.

pub mod registry;
pub mod table;
pub mod types;

use std::any::Any;
use std::ops::Range;

use async_trait::async_trait;

use crate::command::{Command, Map, Value};

pub use registry::Registry;
pub use table::Table;
pub use types::{Domain, DriverError, RegistryError, UnquotedString};

/// Handle-specific argument built by a `command` call.
pub type Argument = Box<dyn Any + Send + Sync>;

/// Recovers the concrete argument a handle built earlier.
pub fn downcast_argument<T: Any>(argument: Argument) -> Result<Box<T>, DriverError> {
    argument
        .downcast::<T>()
        .map_err(|_| DriverError::ArgumentMismatch {
            expected: std::any::type_name::<T>(),
        })
}

/// Forward-only, single-pass sequence of rows with a fixed column order.
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> &[String];

    /// Next row in column order, or `None` once the sequence is exhausted.
    async fn next(&mut self) -> Result<Option<Vec<Value>>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Rows produced by a transform.
///
/// Some sinks need a key alongside each record (a document id, say), so
/// results can also be read with an index.
#[async_trait]
pub trait Results: Rows {
    async fn next_with_index(&mut self) -> Result<Option<(Vec<Value>, Map)>, DriverError>;
}

#[async_trait]
pub trait Extract: Send + Sync {
    /// Pages the next query. Must be called, if at all, before `command`.
    fn set_batch(&mut self, limit: u64, offset: u64);

    async fn command(&self, commands: &[Command]) -> Result<Argument, DriverError>;

    /// Runs the query. `None` signals that the source has no more data.
    async fn query(&mut self, argument: Argument) -> Result<Option<Box<dyn Rows>>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait Transform: Send + Sync {
    async fn command(&self, commands: &[Command]) -> Result<Argument, DriverError>;

    async fn exec(
        &self,
        rows: Box<dyn Rows>,
        argument: Argument,
    ) -> Result<Box<dyn Results>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait Load: Send + Sync {
    async fn command(&self, commands: &[Command]) -> Result<Argument, DriverError>;

    async fn load(&self, results: Box<dyn Results>, argument: Argument) -> Result<(), DriverError>;

    /// Exposes what this handle persisted, for a downstream transaction.
    async fn query_from_next_step(&self) -> Result<Box<dyn Rows>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait ExtractDriver: Send + Sync {
    async fn open(&self, name: &str, data_source: &str) -> Result<Box<dyn Extract>, DriverError>;
}

#[async_trait]
pub trait TransformDriver: Send + Sync {
    async fn open(&self, name: &str, data_source: &str)
        -> Result<Box<dyn Transform>, DriverError>;
}

#[async_trait]
pub trait LoadDriver: Send + Sync {
    async fn open(&self, name: &str, data_source: &str) -> Result<Box<dyn Load>, DriverError>;
}

/// Paging state for extract handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchWindow {
    pub enabled: bool,
    pub limit: u64,
    pub offset: u64,
}

impl BatchWindow {
    pub fn set_batch(&mut self, limit: u64, offset: u64) {
        self.enabled = true;
        self.limit = limit;
        self.offset = offset;
    }

    /// Index range of this window over a source of `len` rows.
    pub fn range(&self, len: usize) -> Range<usize> {
        if !self.enabled {
            return 0..len;
        }
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(len);
        let end = usize::try_from(self.offset.saturating_add(self.limit))
            .unwrap_or(usize::MAX)
            .min(len);
        start..end
    }
}
