//! In-memory row store backend

use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::Value;

use crate::{Error, Result};

use super::{Filter, Order, Row, RowStore};

/// Row store kept in process memory.
///
/// Inserted rows get an integer `id` and a `created_at` timestamp when the caller
/// leaves them out, like the column defaults of the hosted tables.
pub struct MemoryStore {
    tables: DashMap<String, Vec<Row>>,
    next_id: AtomicI64,
    calls: AtomicUsize,
    failure: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
            failure: RwLock::new(None),
        }
    }

    /// Make every following operation fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = None;
        }
    }

    /// Number of operations attempted so far, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot of a table's rows in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    fn begin(&self) -> Result<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        let failure = self
            .failure
            .read()
            .map_err(|_| Error::store("memory store lock poisoned"))?;
        match failure.as_ref() {
            Some(message) => Err(Error::store(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        self.begin()?;

        let mut rows: Vec<Row> = match self.tables.get(table) {
            Some(rows) => rows
                .iter()
                .filter(|row| filters.iter().all(|f| f.matches(row)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        self.begin()?;

        if !row.contains_key("id") {
            let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
            row.insert("id".to_string(), Value::from(id));
        }
        if !row.contains_key("created_at") {
            row.insert(
                "created_at".to_string(),
                Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }

        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()> {
        self.begin()?;

        if let Some(mut rows) = self.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| f.matches(row)))
            {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
            }
        }

        Ok(())
    }
}

// Nulls and missing columns sort first, as Postgres does for ascending NULLS FIRST.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
