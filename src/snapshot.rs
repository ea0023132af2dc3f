//! Snapshot types - the persisted shape of an observed message
//!
//! Every message the relay sees is reduced to one `MessageSnapshot` keyed by
//! `(scope, chat_id, message_id)`. The scope is the business connection the
//! message arrived under; the empty string is the default unscoped channel.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Media classes the relay records and re-delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Voice,
    Audio,
    Animation,
    VideoNote,
}

impl MediaKind {
    /// Get the string representation of the media kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Voice => "voice",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "animation",
            MediaKind::VideoNote => "video_note",
        }
    }

    /// Get all media kinds
    pub fn all() -> &'static [MediaKind] {
        &[
            MediaKind::Photo,
            MediaKind::Video,
            MediaKind::Document,
            MediaKind::Voice,
            MediaKind::Audio,
            MediaKind::Animation,
            MediaKind::VideoNote,
        ]
    }

    /// Kinds that carry a video stream usable for transcoding
    pub fn is_video_like(&self) -> bool {
        matches!(
            self,
            MediaKind::Video | MediaKind::Animation | MediaKind::Document
        )
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            "voice" => Ok(MediaKind::Voice),
            "audio" => Ok(MediaKind::Audio),
            "animation" => Ok(MediaKind::Animation),
            "video_note" => Ok(MediaKind::VideoNote),
            _ => Err(Error::UnknownMediaKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pointer to the binary payload of a media message.
///
/// `Platform` holds an opaque Telegram `file_id` that can be re-sent or
/// resolved to a download URL while it is still valid. `Local` points at a
/// file on this host (a URL download that never had a platform reference).
/// The `local:` string prefix only exists in the storage encoding; everything
/// above the store works with the variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    Platform(String),
    Local(PathBuf),
}

const LOCAL_PREFIX: &str = "local:";

impl MediaRef {
    /// Encode for the snapshots table
    pub fn to_db_string(&self) -> String {
        match self {
            MediaRef::Platform(id) => id.clone(),
            MediaRef::Local(path) => format!("{}{}", LOCAL_PREFIX, path.display()),
        }
    }

    /// Decode the storage encoding back into a variant
    pub fn from_db_string(s: &str) -> Self {
        match s.strip_prefix(LOCAL_PREFIX) {
            Some(path) => MediaRef::Local(PathBuf::from(path)),
            None => MediaRef::Platform(s.to_string()),
        }
    }
}

/// The persisted record of a message's last-known state.
///
/// Identity is `(scope, chat_id, message_id)`; `timestamp` is ingestion time
/// and only participates in recency tie-breaking and eviction, never in
/// identity.
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    /// Business connection id the message arrived under; `""` for plain chats
    pub scope: String,
    pub chat_id: i64,
    /// Platform message id, unique only within (scope, chat)
    pub message_id: i64,
    /// Ingestion time, seconds since epoch
    pub timestamp: i64,
    /// Message text or caption; empty if none
    pub text: String,
    pub media_kind: Option<MediaKind>,
    pub media_ref: Option<MediaRef>,
}

impl MessageSnapshot {
    /// Create a text-only snapshot stamped with the current time
    pub fn new(
        scope: impl Into<String>,
        chat_id: i64,
        message_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            chat_id,
            message_id,
            timestamp: unix_now(),
            text: text.into(),
            media_kind: None,
            media_ref: None,
        }
    }

    /// Attach a media descriptor
    pub fn with_media(mut self, kind: MediaKind, media_ref: MediaRef) -> Self {
        self.media_kind = Some(kind);
        self.media_ref = Some(media_ref);
        self
    }

    /// Override the ingestion timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_media(&self) -> bool {
        self.media_kind.is_some() && self.media_ref.is_some()
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_roundtrip() {
        for kind in MediaKind::all() {
            let s = kind.as_str();
            let parsed: MediaKind = s.parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_media_kind_rejects_unknown() {
        assert!(MediaKind::from_str("sticker").is_err());
    }

    #[test]
    fn test_media_ref_encoding() {
        let platform = MediaRef::Platform("AgACAgIAAxkBAAIB".to_string());
        assert_eq!(platform.to_db_string(), "AgACAgIAAxkBAAIB");
        assert_eq!(
            MediaRef::from_db_string("AgACAgIAAxkBAAIB"),
            platform
        );

        let local = MediaRef::Local(PathBuf::from("/tmp/dl/video.mp4"));
        assert_eq!(local.to_db_string(), "local:/tmp/dl/video.mp4");
        assert_eq!(MediaRef::from_db_string("local:/tmp/dl/video.mp4"), local);
    }

    #[test]
    fn test_snapshot_builder() {
        let snap = MessageSnapshot::new("biz-7", -100123, 42, "hello")
            .with_media(MediaKind::Photo, MediaRef::Platform("fid".to_string()))
            .with_timestamp(1_700_000_000);

        assert_eq!(snap.scope, "biz-7");
        assert_eq!(snap.chat_id, -100123);
        assert_eq!(snap.message_id, 42);
        assert_eq!(snap.timestamp, 1_700_000_000);
        assert!(snap.has_media());
    }
}
