//! Cursor Module
//!
//! Result state of the most recent statement: buffered rows for queries,
//! affected row count and insert id for writes.

use crate::core::value::{Row, Value};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Cursor {
    columns: Vec<String>,
    rows: VecDeque<Row>,
    row_count: u64,
    last_insert_id: Option<i64>,
}

impl Cursor {
    /// Replaces the state with the rows returned by a query.
    pub(crate) fn load_rows(&mut self, columns: Vec<String>, rows: Vec<Vec<Value>>) {
        let shared: Arc<[String]> = columns.clone().into();
        self.row_count = rows.len() as u64;
        self.rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&shared), values))
            .collect();
        self.columns = columns;
        self.last_insert_id = None;
    }

    /// Replaces the state with the outcome of a write.
    pub(crate) fn record_changes(&mut self, changed: u64, last_insert_id: Option<i64>) {
        self.columns.clear();
        self.rows.clear();
        self.row_count = changed;
        self.last_insert_id = last_insert_id;
    }

    pub(crate) fn reset(&mut self) {
        *self = Cursor::default();
    }

    /// Takes the next buffered row.
    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// Takes every remaining buffered row.
    pub fn drain(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Column names of the last query; empty after a write.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows returned by the last query, or rows affected by the last write.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}
