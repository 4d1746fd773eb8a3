//! Row store abstraction layer
//!
//! Provides a narrow select/insert/update interface over named tables, backed by
//! Supabase's REST API or by process memory.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;

pub mod memory;
pub mod supabase;

/// A single table row as a JSON object
pub type Row = Map<String, Value>;

/// Row store trait
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch rows matching every filter, optionally ordered
    async fn select(&self, table: &str, filters: &[Filter], order: Option<&Order>)
        -> Result<Vec<Row>>;

    /// Insert a row and return it as stored
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Apply a patch to every row matching the filters
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()>;
}

/// Column predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Whether a row satisfies this predicate
    pub fn matches(&self, row: &Row) -> bool {
        match self.op {
            FilterOp::Eq => row
                .get(&self.column)
                .is_some_and(|v| values_equal(v, &self.value)),
        }
    }
}

/// Filter operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
}

impl FilterOp {
    /// PostgREST operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
        }
    }
}

/// Result ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

// Ids may arrive as "42" from a path segment while the column holds 42.
fn values_equal(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            a.to_string() == *b
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => stored == wanted,
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Supabase {
        url: String,
        service_key: String,
        schema: String,
        timeout: Duration,
    },
    Memory,
}

impl StoreConfig {
    /// Backend name for logs and health output
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Supabase { .. } => "supabase",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Create row store from config
pub fn create_store(config: StoreConfig) -> Result<Box<dyn RowStore>> {
    match config {
        StoreConfig::Supabase {
            url,
            service_key,
            schema,
            timeout,
        } => {
            let backend = supabase::SupabaseStore::new(url, service_key, schema, timeout)?;
            Ok(Box::new(backend))
        }
        StoreConfig::Memory => Ok(Box::new(memory::MemoryStore::new())),
    }
}
