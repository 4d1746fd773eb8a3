//! Core types for habitlog

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::store::Row;
use crate::Result;

/// Table holding user-defined habit categories
pub const HABIT_TYPES_TABLE: &str = "habit_types";

/// Table holding habit events and sessions
pub const HABIT_LOGS_TABLE: &str = "habit_logs";

/// Identifier as sent by the client or assigned by the store.
///
/// Supabase tables may key rows by integer sequences or by UUID strings, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Blank strings count as absent
    pub fn is_blank(&self) -> bool {
        match self {
            RecordId::Int(_) => false,
            RecordId::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.clone()),
        }
    }

    /// Read an id column out of a stored row
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

/// New row for [`HABIT_TYPES_TABLE`]
#[derive(Debug, Clone, Serialize)]
pub struct NewHabitType {
    pub user_id: RecordId,
    pub nombre: String,
    pub tipo_registro: String,
    pub meta_diaria: Option<Number>,
    pub is_active: bool,
}

/// New row for [`HABIT_LOGS_TABLE`]; the end columns stay unset until the session is closed.
#[derive(Debug, Clone, Serialize)]
pub struct NewHabitLog {
    pub user_id: RecordId,
    pub habit_type_id: RecordId,
    pub fecha_inicio: DateTime<Utc>,
}

/// Patch closing an open habit log
#[derive(Debug, Clone, Serialize)]
pub struct SessionEnd {
    pub fecha_fin: DateTime<Utc>,
    pub duracion_segundos: Number,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
}

/// Serialize a typed record into a store row
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::Error::store(format!(
            "expected a JSON object for a row, got {}",
            other
        ))),
    }
}

/// Body of `POST /habits`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHabitRequest {
    pub user_id: Option<RecordId>,
    pub nombre: Option<String>,
    pub tipo_registro: Option<String>,
    pub meta_diaria: Option<Number>,
}

/// Body of `POST /logs/event` and `POST /logs/session/start`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitEventRequest {
    pub user_id: Option<RecordId>,
    pub habit_type_id: Option<RecordId>,
}

/// Body of `PUT /logs/session/end`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub log_id: Option<RecordId>,
    /// Any JSON number; the row store's column type decides what it accepts
    pub duration_seconds: Option<Number>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    pub log_id: RecordId,
}
