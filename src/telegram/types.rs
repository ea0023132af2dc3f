//! Bot API wire types
//!
//! Every field the relay does not consume is simply left out; serde ignores
//! unknown keys. Fields are defaulted liberally because business updates
//! arrive in two shapes: the documented one, where the business message is a
//! message with a `business_connection_id`, and a flattened one observed in
//! the wild, where text/media sit on the envelope itself with a nested
//! `message` object missing.

use serde::{Deserialize, Serialize};

use crate::snapshot::MediaKind;

/// One long-poll update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
    pub business_message: Option<Message>,
    pub edited_business_message: Option<Message>,
    pub deleted_business_messages: Option<DeletedMessages>,
    pub deleted_messages: Option<DeletedMessages>,
    pub business_connection: Option<serde_json::Value>,
    pub callback_query: Option<CallbackQuery>,
}

/// An inbound message (plain or business, possibly the nested shape)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Message {
    pub message_id: i64,
    pub chat: Option<Chat>,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<FileRef>>,
    pub video: Option<FileRef>,
    pub document: Option<FileRef>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
    pub animation: Option<FileRef>,
    pub video_note: Option<FileRef>,
    pub reply_to_message: Option<Box<Message>>,
    pub business_connection_id: Option<String>,
    /// Nested payload of the non-flattened business envelope
    pub message: Option<Box<Message>>,
}

impl Message {
    /// The message that actually carries content: the nested business
    /// payload when present, otherwise this message itself.
    pub fn effective(&self) -> &Message {
        self.message.as_deref().unwrap_or(self)
    }

    /// Business scope of the envelope; empty string for plain chats
    pub fn scope(&self) -> &str {
        self.business_connection_id.as_deref().unwrap_or("")
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat.as_ref().map(|c| c.id)
    }

    /// Message body or caption, trimmed; empty when neither is present
    pub fn text_or_caption(&self) -> String {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or("")
            .trim()
            .to_string()
    }

    /// Extract the media descriptor, if any.
    ///
    /// Photos arrive as a size ladder; the largest rendition is the one
    /// worth keeping.
    pub fn media(&self) -> Option<(MediaKind, String)> {
        if let Some(sizes) = &self.photo {
            if let Some(best) = sizes.iter().max_by_key(|p| p.file_size.unwrap_or(0)) {
                return Some((MediaKind::Photo, best.file_id.clone()));
            }
        }
        if let Some(f) = &self.video {
            return Some((MediaKind::Video, f.file_id.clone()));
        }
        if let Some(f) = &self.document {
            return Some((MediaKind::Document, f.file_id.clone()));
        }
        if let Some(f) = &self.voice {
            return Some((MediaKind::Voice, f.file_id.clone()));
        }
        if let Some(f) = &self.audio {
            return Some((MediaKind::Audio, f.file_id.clone()));
        }
        if let Some(f) = &self.animation {
            return Some((MediaKind::Animation, f.file_id.clone()));
        }
        if let Some(f) = &self.video_note {
            return Some((MediaKind::VideoNote, f.file_id.clone()));
        }
        None
    }

    /// File id of a video stream suitable for transcoding: a video, an
    /// animation, or a document that smells like a video container.
    pub fn video_file_id(&self) -> Option<String> {
        if let Some(f) = &self.video {
            return Some(f.file_id.clone());
        }
        if let Some(f) = &self.animation {
            return Some(f.file_id.clone());
        }
        if let Some(d) = &self.document {
            let mime = d.mime_type.as_deref().unwrap_or("");
            let name = d.file_name.as_deref().unwrap_or("").to_lowercase();
            let video_ext = [".mp4", ".mov", ".mkv", ".webm", ".m4v"]
                .iter()
                .any(|e| name.ends_with(e));
            if mime.starts_with("video/") || video_ext {
                return Some(d.file_id.clone());
            }
        }
        None
    }
}

/// A file attachment reference (photo size, video, document, ...)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Chat {
    /// Human-readable chat name: full name or username for private chats,
    /// title otherwise
    pub fn display_name(&self) -> Option<String> {
        if self.kind.as_deref() == Some("private") {
            let mut full = self.first_name.clone().unwrap_or_default();
            if let Some(last) = &self.last_name {
                if !full.is_empty() {
                    full.push(' ');
                }
                full.push_str(last);
            }
            if !full.is_empty() {
                return Some(full);
            }
            return self.username.clone();
        }
        self.title.clone()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    pub fn full_name(&self) -> Option<String> {
        let mut full = self.first_name.clone().unwrap_or_default();
        if let Some(last) = &self.last_name {
            if !full.is_empty() {
                full.push(' ');
            }
            full.push_str(last);
        }
        if full.is_empty() {
            self.username.clone()
        } else {
            Some(full)
        }
    }
}

/// `deleted_messages` / `deleted_business_messages` payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeletedMessages {
    pub business_connection_id: Option<String>,
    pub chat: Option<Chat>,
    pub from: Option<User>,
    pub message_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Option<User>,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// `getFile` result
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    pub file_path: Option<String>,
}

/// Envelope every Bot API call returns
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// Outbound inline keyboard
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_picks_largest_rendition() {
        let raw = r#"{
            "message_id": 10,
            "chat": {"id": 5, "type": "private", "first_name": "Ann"},
            "photo": [
                {"file_id": "small", "file_size": 1200},
                {"file_id": "large", "file_size": 90000},
                {"file_id": "mid", "file_size": 40000}
            ]
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let (kind, file_id) = msg.media().unwrap();
        assert_eq!(kind, MediaKind::Photo);
        assert_eq!(file_id, "large");
    }

    #[test]
    fn test_nested_business_shape() {
        let raw = r#"{
            "business_connection_id": "biz-1",
            "message": {
                "message_id": 77,
                "chat": {"id": 9},
                "text": "inner"
            }
        }"#;
        let envelope: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.scope(), "biz-1");
        let inner = envelope.effective();
        assert_eq!(inner.message_id, 77);
        assert_eq!(inner.text_or_caption(), "inner");
    }

    #[test]
    fn test_flattened_business_shape() {
        let raw = r#"{
            "business_connection_id": "biz-1",
            "message_id": 78,
            "chat": {"id": 9},
            "caption": "  flattened  ",
            "voice": {"file_id": "v1"}
        }"#;
        let envelope: Message = serde_json::from_str(raw).unwrap();
        let inner = envelope.effective();
        assert_eq!(inner.message_id, 78);
        assert_eq!(inner.text_or_caption(), "flattened");
        assert_eq!(inner.media().unwrap().0, MediaKind::Voice);
    }

    #[test]
    fn test_video_file_id_accepts_video_documents() {
        let raw = r#"{
            "message_id": 1,
            "document": {"file_id": "d1", "file_name": "clip.MP4"}
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.video_file_id().unwrap(), "d1");

        let raw = r#"{
            "message_id": 2,
            "document": {"file_id": "d2", "file_name": "notes.pdf", "mime_type": "application/pdf"}
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert!(msg.video_file_id().is_none());
    }

    #[test]
    fn test_update_routing_fields() {
        let raw = r#"{
            "update_id": 123,
            "deleted_messages": {
                "chat": {"id": -100, "type": "supergroup", "title": "lounge"},
                "message_ids": [5, 6, 7]
            }
        }"#;
        let upd: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(upd.update_id, 123);
        let deleted = upd.deleted_messages.unwrap();
        assert_eq!(deleted.message_ids, vec![5, 6, 7]);
        assert_eq!(deleted.chat.unwrap().display_name().unwrap(), "lounge");
    }
}
