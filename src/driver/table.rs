use async_trait::async_trait;

use super::{BatchWindow, DriverError, Results, Rows};
use crate::command::{Map, Value};

/// In-memory row sequence.
///
/// Handy for transforms that materialise their output and for drivers over
/// small sources. Reading advances a cursor; [`Table::reset_cursor`] rewinds
/// it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    cursor: usize,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            data: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        Table {
            columns,
            data: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Builds a table from records; columns come from the first record's keys.
    pub fn from_maps(records: &[Map]) -> Self {
        let Some(first) = records.first() else {
            return Table::default();
        };
        let columns: Vec<String> = first.keys().cloned().collect();
        let mut table = Table::with_capacity(columns, records.len());
        for record in records {
            let row = table
                .columns
                .iter()
                .map(|column| record.get(column).cloned().unwrap_or_default())
                .collect();
            table.data.push(row);
        }
        table
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    pub fn push(&mut self, row: Vec<Value>) {
        self.data.push(row);
    }

    pub fn data(&self) -> &[Vec<Value>] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Copy of the rows inside `window`, with a fresh cursor.
    pub fn window(&self, window: &BatchWindow) -> Table {
        Table {
            columns: self.columns.clone(),
            data: self.data[window.range(self.data.len())].to_vec(),
            cursor: 0,
        }
    }
}

#[async_trait]
impl Rows for Table {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        let row = self.data.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[async_trait]
impl Results for Table {
    /// The index is the row position, under the key `"row"`.
    async fn next_with_index(&mut self) -> Result<Option<(Vec<Value>, Map)>, DriverError> {
        let position = self.cursor;
        Ok(self.next().await?.map(|row| {
            let mut index = Map::new();
            index.insert("row".to_string(), Value::Int(position as i64));
            (row, index)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Map {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_table_reads_forward_once() {
        let mut table = Table::new(vec!["n".to_string()]);
        table.push(vec![Value::Int(1)]);
        table.push(vec![Value::Int(2)]);

        assert_eq!(table.next().await.unwrap(), Some(vec![Value::Int(1)]));
        assert_eq!(table.next().await.unwrap(), Some(vec![Value::Int(2)]));
        assert_eq!(table.next().await.unwrap(), None);
        assert_eq!(table.next().await.unwrap(), None);

        table.reset_cursor();
        assert_eq!(table.next().await.unwrap(), Some(vec![Value::Int(1)]));
    }

    #[tokio::test]
    async fn test_from_maps_uses_first_record_columns() {
        let records = vec![
            record(&[("b", Value::Int(1)), ("a", Value::from("x"))]),
            record(&[("a", Value::from("y")), ("c", Value::Bool(true))]),
        ];
        let mut table = Table::from_maps(&records);

        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(
            table.next().await.unwrap(),
            Some(vec![Value::from("x"), Value::Int(1)])
        );
        assert_eq!(
            table.next().await.unwrap(),
            Some(vec![Value::from("y"), Value::Null])
        );
        assert!(Table::from_maps(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_next_with_index_reports_position() {
        let mut table = Table::new(vec!["n".to_string()]);
        table.push(vec![Value::Int(10)]);
        table.push(vec![Value::Int(20)]);
        table.next().await.unwrap();

        let (row, index) = table.next_with_index().await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Int(20)]);
        assert_eq!(index["row"], Value::Int(1));
        assert!(table.next_with_index().await.unwrap().is_none());
    }

    #[test]
    fn test_window_slices_rows() {
        let mut table = Table::new(vec!["n".to_string()]);
        for i in 0..5 {
            table.push(vec![Value::Int(i)]);
        }
        let mut window = BatchWindow::default();
        window.set_batch(2, 3);

        let page = table.window(&window);
        assert_eq!(page.data(), &[vec![Value::Int(3)], vec![Value::Int(4)]]);
    }
}
