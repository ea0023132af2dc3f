//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with one table:
//! - snapshots(scope, chat_id, msg_id, ts, text, media_kind, media_ref)

pub mod schema;
pub mod sqlite;

pub use sqlite::{SnapshotStore, StoreStats};
