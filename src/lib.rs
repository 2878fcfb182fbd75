//! # etlx
//!
//! Pluggable extract/transform/load orchestration driven by declarative,
//! typed commands.
//!
//! ## Features
//!
//! - **Typed commands** parsed from JSON and coerced at construction time
//! - **Driver registry** mapping names to extract, transform and load factories
//! - **Batched transactions** that page the source while workers transform and load
//! - **Backpressure** via a bounded queue in front of the workers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlx::command::Command;
//! use etlx::driver::Registry;
//! use etlx::etl::{Transaction, TransactionConfig};
//!
//! let registry = Registry::global().read().unwrap();
//! let mut tx = Transaction::open(&registry, "pg", "passthrough", "mongo",
//!     TransactionConfig::batched(1000))?;
//! tx.open_extract("orders", "postgres://localhost/shop").await?;
//! tx.open_transform("orders", "").await?;
//! tx.open_load("orders", "mongodb://localhost").await?;
//!
//! let query = Command::parse_list(r#"[{"name": "table", "type": "string", "value": "orders"}]"#)?;
//! tx.exec(&query, &[], &[]).await?;
//! let errors = tx.close().await;
//! ```
//!
//! ## Modules
//!
//! - [`command`] - Command trees and value coercion
//! - [`driver`] - Handle traits, row sequences and the driver registry
//! - [`pool`] - Bounded worker pool
//! - [`etl`] - Transactions

pub mod command;
pub mod driver;
pub mod etl;
pub mod pool;
