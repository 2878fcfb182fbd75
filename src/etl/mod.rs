//! Transactions.
//!
//! A [`Transaction`] binds one extract, one transform and one load handle.
//! Without batching, [`Transaction::exec`] runs the three phases once, in
//! order. With batching, the control loop pages the extract handle one
//! window at a time and hands every non-empty page to a [`WorkerPool`] that
//! runs transform and load, so the next extract overlaps with the previous
//! batch's transform and load.
//!
//! Extraction stays strictly sequential. Batches may finish loading in any
//! order.

pub mod config;
pub mod cursor;
pub mod types;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, Value};
use crate::driver::{
    BatchWindow, Domain, DriverError, Extract, ExtractDriver, Load, LoadDriver, Registry, Rows,
    Transform, TransformDriver,
};
use crate::pool::{Processor, WorkerPool};

pub use config::{BatchControl, TransactionConfig, TransactionConfigBuilder};
pub use cursor::BatchController;
pub use types::{BatchFailure, CloseErrors, ETLError};

use cursor::BatchCursor;

/// Counters of a finished [`Transaction::exec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecReport {
    /// Extract queries issued, including the one that found no more data.
    pub extract_calls: u64,
    /// Row sequences handed to transform and load.
    pub batches: u64,
}

pub struct Transaction {
    extract_driver: Arc<dyn ExtractDriver>,
    transform_driver: Arc<dyn TransformDriver>,
    load_driver: Arc<dyn LoadDriver>,
    extract: Option<Box<dyn Extract>>,
    transform: Option<Arc<dyn Transform>>,
    load: Option<Arc<dyn Load>>,
    config: TransactionConfig,
    cursor: BatchCursor,
    controller: BatchController,
}

impl Transaction {
    /// Resolves the three named drivers. Handles are opened separately.
    pub fn open(
        registry: &Registry,
        extract: &str,
        transform: &str,
        load: &str,
        config: TransactionConfig,
    ) -> Result<Self, ETLError> {
        config.validate()?;
        let extract_driver = registry.find_extract(extract)?;
        let transform_driver = registry.find_transform(transform)?;
        let load_driver = registry.find_load(load)?;
        let (cursor, controller) = BatchCursor::new(config.batch_size());

        info!(
            extract,
            transform,
            load,
            batch = %config.batch(),
            batch_size = config.batch_size(),
            "transaction opened"
        );
        Ok(Transaction {
            extract_driver,
            transform_driver,
            load_driver,
            extract: None,
            transform: None,
            load: None,
            config,
            cursor,
            controller,
        })
    }

    pub async fn open_extract(&mut self, name: &str, data_source: &str) -> Result<(), ETLError> {
        if name.is_empty() || data_source.is_empty() {
            return Err(ETLError::Configuration(
                "extract handle needs a name and a data source".to_string(),
            ));
        }
        let handle = self
            .extract_driver
            .open(name, data_source)
            .await
            .map_err(|e| ETLError::phase(Domain::Extract, e))?;
        debug!(name, "extract handle opened");

        if let Some(mut previous) = self.extract.replace(handle) {
            if let Err(error) = previous.close().await {
                warn!(%error, "closing replaced extract handle failed");
            }
        }
        Ok(())
    }

    pub async fn open_transform(&mut self, name: &str, data_source: &str) -> Result<(), ETLError> {
        let handle: Arc<dyn Transform> = self
            .transform_driver
            .open(name, data_source)
            .await
            .map_err(|e| ETLError::phase(Domain::Transform, e))?
            .into();
        debug!(name, "transform handle opened");

        if let Some(previous) = self.transform.replace(handle) {
            if let Err(error) = previous.close().await {
                warn!(%error, "closing replaced transform handle failed");
            }
        }
        Ok(())
    }

    pub async fn open_load(&mut self, name: &str, data_source: &str) -> Result<(), ETLError> {
        let handle: Arc<dyn Load> = self
            .load_driver
            .open(name, data_source)
            .await
            .map_err(|e| ETLError::phase(Domain::Load, e))?
            .into();
        debug!(name, "load handle opened");

        if let Some(previous) = self.load.replace(handle) {
            if let Err(error) = previous.close().await {
                warn!(%error, "closing replaced load handle failed");
            }
        }
        Ok(())
    }

    /// Runs the pipeline with the given commands for each phase.
    ///
    /// In batched mode the loop ends when the extract handle returns `None`
    /// or an empty row sequence. An extract error is returned as such, or as
    /// [`ETLError::Aborted`] when dispatched batches failed too. A failed
    /// batch stops further extraction; every batch already dispatched still
    /// runs, and all failures come back in [`ETLError::Batches`].
    pub async fn exec(
        &mut self,
        extract_commands: &[Command],
        transform_commands: &[Command],
        load_commands: &[Command],
    ) -> Result<ExecReport, ETLError> {
        let extract = self
            .extract
            .as_deref_mut()
            .ok_or(ETLError::NotOpened(Domain::Extract))?;
        let transform = self
            .transform
            .clone()
            .ok_or(ETLError::NotOpened(Domain::Transform))?;
        let load = self
            .load
            .clone()
            .ok_or(ETLError::NotOpened(Domain::Load))?;

        if !self.config.is_batched() {
            return exec_once(
                extract,
                &*transform,
                &*load,
                extract_commands,
                transform_commands,
                load_commands,
            )
            .await;
        }

        let cancel = CancellationToken::new();
        let stage = Stage {
            transform,
            load,
            transform_commands: transform_commands.to_vec(),
            load_commands: load_commands.to_vec(),
        };
        let pool = WorkerPool::start(&self.config.pool_config(), &cancel, stage);

        let mut report = ExecReport::default();
        let mut window = self.cursor.reset();
        let extracted = loop {
            if cancel.is_cancelled() {
                warn!(offset = window.offset, "stopping extraction after failed batch");
                break Ok(());
            }
            report.extract_calls += 1;
            match extract_batch(extract, extract_commands, window).await {
                Ok(Some(rows)) => {
                    debug!(offset = window.offset, limit = window.limit, "batch dispatched");
                    if let Err(e) = pool.submit(Batch { window, rows }).await {
                        break Err(ETLError::from(e));
                    }
                    report.batches += 1;
                    window = self.cursor.advance();
                }
                Ok(None) => {
                    debug!(offset = window.offset, "extract exhausted");
                    break Ok(());
                }
                Err(e) => break Err(ETLError::phase(Domain::Extract, e)),
            }
        };

        let mut failures = match pool.join().await {
            Ok(summary) => summary.errors,
            Err(e) => {
                extracted?;
                return Err(e.into());
            }
        };
        failures.sort_by_key(|failure| failure.offset);
        match (extracted, failures.is_empty()) {
            (Ok(()), true) => {}
            (Ok(()), false) => return Err(ETLError::Batches(failures)),
            (
                Err(ETLError::Phase {
                    phase: Domain::Extract,
                    source,
                }),
                false,
            ) => {
                return Err(ETLError::Aborted {
                    extract: source,
                    batches: failures,
                })
            }
            (Err(e), _) => return Err(e),
        }

        info!(
            batches = report.batches,
            extract_calls = report.extract_calls,
            "transaction finished"
        );
        Ok(report)
    }

    /// Changes the batch size from the next batch on.
    pub fn set_batch_size(&self, size: u64) -> Result<(), ETLError> {
        self.controller.set_batch_size(size)
    }

    /// Handle for resizing batches while `exec` runs.
    pub fn batch_controller(&self) -> BatchController {
        self.controller.clone()
    }

    /// What the load handle persisted, for chaining into another transaction.
    pub async fn query_from_next_step(&self) -> Result<Box<dyn Rows>, ETLError> {
        let load = self.load.as_ref().ok_or(ETLError::NotOpened(Domain::Load))?;
        load.query_from_next_step()
            .await
            .map_err(|e| ETLError::phase(Domain::Load, e))
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Closes every opened handle. A failed close never skips the others.
    pub async fn close(mut self) -> CloseErrors {
        let mut errors = CloseErrors::default();
        if let Some(mut extract) = self.extract.take() {
            errors.extract = extract.close().await.err();
        }
        if let Some(transform) = self.transform.take() {
            errors.transform = transform.close().await.err();
        }
        if let Some(load) = self.load.take() {
            errors.load = load.close().await.err();
        }

        for (domain, error) in errors.errors() {
            warn!(%domain, %error, "close failed");
        }
        errors
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("extract", &self.extract.is_some())
            .field("transform", &self.transform.is_some())
            .field("load", &self.load.is_some())
            .field("config", &self.config)
            .finish()
    }
}

async fn exec_once(
    extract: &mut dyn Extract,
    transform: &dyn Transform,
    load: &dyn Load,
    extract_commands: &[Command],
    transform_commands: &[Command],
    load_commands: &[Command],
) -> Result<ExecReport, ETLError> {
    let argument = extract
        .command(extract_commands)
        .await
        .map_err(|e| ETLError::phase(Domain::Extract, e))?;
    let rows = extract
        .query(argument)
        .await
        .map_err(|e| ETLError::phase(Domain::Extract, e))?;
    let Some(rows) = rows else {
        info!("extract returned no data");
        return Ok(ExecReport {
            extract_calls: 1,
            batches: 0,
        });
    };

    transform_and_load(transform, load, transform_commands, load_commands, rows)
        .await
        .map_err(|(phase, e)| ETLError::phase(phase, e))?;
    info!("transaction finished");
    Ok(ExecReport {
        extract_calls: 1,
        batches: 1,
    })
}

async fn extract_batch(
    extract: &mut dyn Extract,
    commands: &[Command],
    window: BatchWindow,
) -> Result<Option<Box<dyn Rows>>, DriverError> {
    extract.set_batch(window.limit, window.offset);
    let argument = extract.command(commands).await?;
    let Some(mut rows) = extract.query(argument).await? else {
        return Ok(None);
    };

    match rows.next().await? {
        Some(first) => Ok(Some(Box::new(Prefetched {
            first: Some(first),
            rows,
        }))),
        None => {
            rows.close().await?;
            Ok(None)
        }
    }
}

async fn transform_and_load(
    transform: &dyn Transform,
    load: &dyn Load,
    transform_commands: &[Command],
    load_commands: &[Command],
    rows: Box<dyn Rows>,
) -> Result<(), (Domain, DriverError)> {
    let argument = transform
        .command(transform_commands)
        .await
        .map_err(|e| (Domain::Transform, e))?;
    let results = transform
        .exec(rows, argument)
        .await
        .map_err(|e| (Domain::Transform, e))?;
    let argument = load
        .command(load_commands)
        .await
        .map_err(|e| (Domain::Load, e))?;
    load.load(results, argument)
        .await
        .map_err(|e| (Domain::Load, e))
}

struct Batch {
    window: BatchWindow,
    rows: Box<dyn Rows>,
}

/// Transform and load of one batch, run by the pool workers.
struct Stage {
    transform: Arc<dyn Transform>,
    load: Arc<dyn Load>,
    transform_commands: Vec<Command>,
    load_commands: Vec<Command>,
}

#[async_trait]
impl Processor<Batch> for Stage {
    type Error = BatchFailure;

    async fn process(&self, cancel: &CancellationToken, batch: Batch) -> Result<(), BatchFailure> {
        let Batch { window, rows } = batch;
        let outcome = transform_and_load(
            &*self.transform,
            &*self.load,
            &self.transform_commands,
            &self.load_commands,
            rows,
        )
        .await;

        match outcome {
            Ok(()) => {
                debug!(offset = window.offset, "batch loaded");
                Ok(())
            }
            Err((phase, error)) => {
                warn!(offset = window.offset, %phase, %error, "batch failed");
                cancel.cancel();
                Err(BatchFailure {
                    offset: window.offset,
                    limit: window.limit,
                    phase,
                    error,
                })
            }
        }
    }
}

/// Row sequence with its first row already read.
struct Prefetched {
    first: Option<Vec<Value>>,
    rows: Box<dyn Rows>,
}

#[async_trait]
impl Rows for Prefetched {
    fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    async fn next(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        if let Some(row) = self.first.take() {
            return Ok(Some(row));
        }
        self.rows.next().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.rows.close().await
    }
}
