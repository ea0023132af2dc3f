//! Telegram Bot API surface
//!
//! Typed models for the subset of the wire format the relay consumes, plus
//! the HTTP client used for polling, sending, and file downloads.

pub mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::{CallbackQuery, Chat, DeletedMessages, FileRef, Message, Update, User};
