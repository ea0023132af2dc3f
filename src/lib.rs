//! # Shadowlog - Message shadow-store and deletion-audit relay
//!
//! Shadowlog mirrors every message a Telegram bot observes into a durable
//! side-store so that later edit/delete events can be reconstructed and
//! reported after the platform stops exposing the original content.
//!
//! Shadowlog provides:
//! - Durable snapshot store keyed by (scope, chat, message)
//! - Tiered fallback resolver for imprecise edit/delete lookups
//! - Filesystem media cache with age-based eviction
//! - Long-polling dispatch loop with per-update fault isolation
//! - Audit reporting to the bot owner

pub mod cache;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod ingest;
pub mod media;
pub mod owner;
pub mod report;
pub mod resolver;
pub mod snapshot;
pub mod storage;
pub mod telegram;

// Re-exports for convenient access
pub use cache::MediaCache;
pub use resolver::{ResolveOutcome, Resolver};
pub use snapshot::{MediaKind, MediaRef, MessageSnapshot};
pub use storage::SnapshotStore;

/// Result type alias for Shadowlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Shadowlog operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown media kind: {0}")]
    UnknownMediaKind(String),

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Download failed: {0}")]
    Download(String),
}
