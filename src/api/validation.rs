//! Required-field checks for request bodies

use crate::types::RecordId;

use super::error::ApiError;

/// Collects the names of required fields that were absent or blank.
///
/// Each accessor hands the value back only when it is present, so handlers can
/// destructure all of them at once and report every missing field in one response.
#[derive(Debug, Default)]
pub struct MissingFields {
    names: Vec<&'static str>,
}

impl MissingFields {
    pub fn id(&mut self, name: &'static str, value: Option<RecordId>) -> Option<RecordId> {
        match value {
            Some(id) if !id.is_blank() => Some(id),
            _ => self.miss(name),
        }
    }

    pub fn text(&mut self, name: &'static str, value: Option<String>) -> Option<String> {
        match value {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => self.miss(name),
        }
    }

    /// Presence-only check; zero and other falsy values count as present
    pub fn value<T>(&mut self, name: &'static str, value: Option<T>) -> Option<T> {
        match value {
            Some(v) => Some(v),
            None => self.miss(name),
        }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn into_error(self) -> ApiError {
        ApiError::missing_fields(&self.names)
    }

    fn miss<T>(&mut self, name: &'static str) -> Option<T> {
        self.names.push(name);
        None
    }
}
