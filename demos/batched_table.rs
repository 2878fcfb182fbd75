//! Pages an inline JSON table through a typed transform into stdout.
//!
//! ```text
//! RUST_LOG=etlx=debug cargo run --example batched_table
//! ```

use async_trait::async_trait;
use etlx::command::{self, json_from_map, tabular_to_map, Command, CommandValue, Map, Value};
use etlx::driver::{
    downcast_argument, Argument, BatchWindow, DriverError, Extract, ExtractDriver, Load,
    LoadDriver, Registry, Results, Rows, Table, Transform, TransformDriver,
};
use etlx::etl::{Transaction, TransactionConfig};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ORDERS: &str = r#"[
    {"id": "1", "amount": "1,250.50", "placed": "2024/03/07::2006/01/02", "paid": "yes", "city": "Hanoi"},
    {"id": "2", "amount": "99", "placed": "2024.03.08", "paid": "no", "city": "Da Nang"},
    {"id": "3", "amount": "12.5e1", "placed": "2024-3-9", "paid": "t", "city": "Hue"},
    {"id": "4", "amount": "7", "placed": "2024/03/10::2006/01/02", "paid": "false", "city": "Can Tho"},
    {"id": "5", "amount": "310.00", "placed": "2024/03/11::2006/01/02", "paid": "1", "city": "Hanoi"}
]"#;

const TRANSFORM: &str = r#"[
    {"name": "id", "type": "int"},
    {"name": "amount", "type": "float"},
    {"name": "placed", "type": "time", "arg": "2006-01-02"},
    {"name": "paid", "type": "bool"},
    {"name": "city", "type": "string"}
]"#;

const LOAD: &str = r#"[
    {"name": "document", "type": "json", "value": {
        "id": 0,
        "order": {"amount": 0, "paid": false, "placed": ""},
        "shipping": {"city": ""}
    }}
]"#;

const CONFIG: &str = r#"{"batch_control": "enable", "batch_size": 2, "worker_num": 2}"#;

struct Inline;

struct InlineExtract {
    table: Table,
    window: BatchWindow,
}

#[async_trait]
impl Extract for InlineExtract {
    fn set_batch(&mut self, limit: u64, offset: u64) {
        self.window.set_batch(limit, offset);
    }

    async fn command(&self, _commands: &[Command]) -> Result<Argument, DriverError> {
        Ok(Box::new(()))
    }

    async fn query(&mut self, _argument: Argument) -> Result<Option<Box<dyn Rows>>, DriverError> {
        let page = self.table.window(&self.window);
        if page.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(page)))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Coerces each column to the type its command names.
struct Typed;

#[async_trait]
impl Transform for Typed {
    async fn command(&self, commands: &[Command]) -> Result<Argument, DriverError> {
        Ok(Box::new(commands.to_vec()))
    }

    async fn exec(
        &self,
        mut rows: Box<dyn Rows>,
        argument: Argument,
    ) -> Result<Box<dyn Results>, DriverError> {
        let commands = downcast_argument::<Vec<Command>>(argument)?;
        let columns: Vec<String> = commands.iter().map(|c| c.name().to_string()).collect();
        let source_columns = rows.columns().to_vec();
        let mut out = Table::new(columns.clone());

        while let Some(row) = rows.next().await? {
            let record = tabular_to_map(&source_columns, &row)?;
            let mut typed = Vec::with_capacity(commands.len());
            for spec in commands.iter() {
                let value = record.get(spec.name()).cloned().unwrap_or_default();
                let layout = spec.arg_as::<String>().transpose()?;
                typed.push(to_value(command::coerce(spec.kind(), &value, layout.as_deref())?));
            }
            out.push(typed);
        }
        rows.close().await?;
        Ok(Box::new(out))
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn to_value(value: CommandValue) -> Value {
    match value {
        CommandValue::Int(n) => Value::Int(n),
        CommandValue::Float(f) => Value::Float(f),
        CommandValue::Bool(b) => Value::Bool(b),
        CommandValue::Time(t) => Value::Time(t),
        CommandValue::String(s) => Value::String(s),
        _ => Value::Null,
    }
}

/// Shapes each record into a document and prints it.
struct Stdout {
    written: Mutex<Vec<Map>>,
}

#[async_trait]
impl Load for Stdout {
    async fn command(&self, commands: &[Command]) -> Result<Argument, DriverError> {
        let template = command::find(commands, "document")
            .and_then(|c| c.value())
            .and_then(|v| match v {
                CommandValue::Json(document) => Some(document.clone()),
                _ => None,
            });
        Ok(Box::new(template))
    }

    async fn load(&self, mut results: Box<dyn Results>, argument: Argument) -> Result<(), DriverError> {
        let template =
            *downcast_argument::<Option<serde_json::Map<String, serde_json::Value>>>(argument)?;
        let columns = results.columns().to_vec();
        while let Some((row, index)) = results.next_with_index().await? {
            let record = tabular_to_map(&columns, &row)?;
            let document = json_from_map(&record, &columns, template.as_ref())?;
            tracing::info!(row = %index["row"], "{document}");
            self.written.lock().await.push(record);
        }
        Ok(())
    }

    async fn query_from_next_step(&self) -> Result<Box<dyn Rows>, DriverError> {
        Ok(Box::new(Table::from_maps(&self.written.lock().await)))
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[async_trait]
impl ExtractDriver for Inline {
    async fn open(&self, _name: &str, data_source: &str) -> Result<Box<dyn Extract>, DriverError> {
        let records: Vec<serde_json::Value> =
            serde_json::from_str(data_source).map_err(DriverError::backend)?;
        let records: Vec<Map> = records
            .into_iter()
            .filter_map(|record| match Value::from(record) {
                Value::Map(map) => Some(map),
                _ => None,
            })
            .collect();
        Ok(Box::new(InlineExtract {
            table: Table::from_maps(&records),
            window: BatchWindow::default(),
        }))
    }
}

#[async_trait]
impl TransformDriver for Inline {
    async fn open(&self, _name: &str, _source: &str) -> Result<Box<dyn Transform>, DriverError> {
        Ok(Box::new(Typed))
    }
}

#[async_trait]
impl LoadDriver for Inline {
    async fn open(&self, _name: &str, _source: &str) -> Result<Box<dyn Load>, DriverError> {
        Ok(Box::new(Stdout {
            written: Mutex::new(Vec::new()),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    {
        let mut registry = Registry::global()
            .write()
            .map_err(|_| "driver registry poisoned")?;
        let driver = Arc::new(Inline);
        registry.register_extract("inline", driver.clone())?;
        registry.register_transform("typed", driver.clone())?;
        registry.register_load("stdout", driver)?;
    }

    let config: TransactionConfig = serde_json::from_str(CONFIG)?;
    let transform = Command::parse_list(TRANSFORM)?;
    let load = Command::parse_list(LOAD)?;

    let mut tx = {
        let registry = Registry::global()
            .read()
            .map_err(|_| "driver registry poisoned")?;
        Transaction::open(&registry, "inline", "typed", "stdout", config)?
    };
    tx.open_extract("orders", ORDERS).await?;
    tx.open_transform("orders", "-").await?;
    tx.open_load("orders", "-").await?;

    let report = tx.exec(&[], &transform, &load).await?;
    tracing::info!(
        batches = report.batches,
        extract_calls = report.extract_calls,
        "done"
    );

    let mut loaded = tx.query_from_next_step().await?;
    let mut count = 0;
    while loaded.next().await?.is_some() {
        count += 1;
    }
    tracing::info!(count, "records persisted");

    let errors = tx.close().await;
    for (domain, error) in errors.errors() {
        tracing::error!(%domain, %error, "close failed");
    }
    Ok(())
}
