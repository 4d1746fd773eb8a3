//! Habitlog - HTTP API for habit tracking on top of a hosted row store
//!
//! Habitlog exposes a small REST surface for a mobile client:
//! - Habit types per user (list, create)
//! - One-shot habit events
//! - Timed sessions (start, end)
//!
//! Every request is validated up front and then delegated to a [`store::RowStore`],
//! either Supabase's REST interface or an in-memory store for tests and local runs.

pub mod api;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
