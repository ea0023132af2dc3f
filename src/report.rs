//! Audit reporting - renders and delivers edit/delete reports
//!
//! The reporting layer consumes resolver output and never raises toward the
//! dispatch loop: delivery problems degrade to plainer messages and finally
//! to a log line.

use std::path::{Path, PathBuf};

use crate::cache::MediaCache;
use crate::media;
use crate::resolver::{ResolveOutcome, ResolveTier, Resolver};
use crate::snapshot::{MediaKind, MediaRef, MessageSnapshot};
use crate::storage::SnapshotStore;
use crate::owner::OwnerRegistry;
use crate::telegram::{TelegramClient, User};
use crate::Result;

/// Escape text for Telegram HTML parse mode
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render a clickable actor reference, falling back to whatever identity
/// the event carried
pub fn actor_link(
    actor: Option<&User>,
    fallback_user_id: Option<i64>,
    fallback_name: Option<&str>,
) -> String {
    let uid = actor.map(|a| a.id).filter(|id| *id != 0).or(fallback_user_id);
    let name = actor
        .and_then(|a| a.full_name())
        .or_else(|| fallback_name.map(str::to_string))
        .or_else(|| uid.map(|id| id.to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let name = html_escape(&name);
    match uid {
        Some(uid) => format!(r#"<a href="tg://user?id={uid}">{name}</a>"#),
        None => name,
    }
}

/// Human label for a media kind in deletion reports
pub fn media_label(kind: Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Photo) => "📷 photo",
        Some(MediaKind::Video) => "🎬 video",
        Some(MediaKind::VideoNote) => "🔘 video note",
        Some(MediaKind::Voice) => "🎵 voice message",
        Some(MediaKind::Audio) => "🎵 audio",
        Some(MediaKind::Animation) => "🖼 GIF/animation",
        Some(MediaKind::Document) => "📄 document",
        None => "—",
    }
}

/// What a deletion report can be built from
#[derive(Debug)]
pub enum RecoveredContent {
    /// The store had a snapshot; the cache was never consulted
    Snapshot(MessageSnapshot, ResolveTier),
    /// Total store miss, but the media cache still held the payload
    CachedMedia(MediaKind, PathBuf),
    /// Neither store nor cache knows the message
    Unavailable,
}

/// Reconstruct "what was there" for a deleted message.
///
/// The resolver runs first and its result is final whenever it finds a
/// snapshot; only a total miss falls through to the media cache.
pub fn recover_content(
    store: &SnapshotStore,
    cache: &MediaCache,
    radius: i64,
    scope: &str,
    chat_id: i64,
    message_id: i64,
) -> Result<RecoveredContent> {
    match Resolver::new(store)
        .with_radius(radius)
        .resolve(scope, chat_id, message_id)?
    {
        ResolveOutcome::Found { snapshot, tier } => Ok(RecoveredContent::Snapshot(snapshot, tier)),
        ResolveOutcome::NotFound => match cache.try_fetch(chat_id, message_id) {
            Some((kind, path)) => Ok(RecoveredContent::CachedMedia(kind, path)),
            None => Ok(RecoveredContent::Unavailable),
        },
    }
}

/// Owner-directed audit output
pub struct Reporter<'a> {
    client: &'a TelegramClient,
    owner: &'a OwnerRegistry,
}

impl<'a> Reporter<'a> {
    pub fn new(client: &'a TelegramClient, owner: &'a OwnerRegistry) -> Self {
        Self { client, owner }
    }

    /// Deliver an HTML log message to the owner; without a target it only
    /// reaches the process log
    pub async fn send_log_html(&self, html: &str) {
        let Some(target) = self.owner.target_chat() else {
            tracing::info!(log = html, "no owner configured, audit message dropped");
            return;
        };
        if let Err(e) = self.client.send_message(target, html).await {
            tracing::warn!(error = %e, "failed to deliver audit message");
        }
    }

    pub async fn announce(&self, text: &str) {
        self.send_log_html(text).await;
    }

    pub async fn report_edit(
        &self,
        actor_html: &str,
        old_text: &str,
        new_text: &str,
    ) {
        let html = format!(
            "✏️ <b>Message edited</b>\n👤 {actor_html}\n\n— Before:\n<code>{}</code>\n\n— After:\n<code>{}</code>",
            html_escape(old_text),
            html_escape(new_text),
        );
        self.send_log_html(&html).await;
    }

    /// Render and deliver a deletion report.
    ///
    /// Media is re-delivered when possible: by platform file id while the
    /// reference is alive, from the cache payload otherwise. Video notes
    /// cannot carry captions, so the caption goes out as its own message.
    pub async fn report_deletion(
        &self,
        actor_html: &str,
        business: bool,
        message_id: i64,
        content: RecoveredContent,
    ) {
        let header = if business {
            "🗑 <b>Message deleted</b>"
        } else {
            "🗑 <b>Message deleted (plain chat)</b>"
        };

        match content {
            RecoveredContent::Snapshot(snapshot, tier) => {
                let caption = format!(
                    "{header}\n👤 {actor_html}\n<b>Media:</b> {}\n\n<b>Text:</b>\n<code>{}</code>",
                    media_label(snapshot.media_kind),
                    non_empty(&html_escape(&snapshot.text)),
                );
                tracing::info!(
                    chat = snapshot.chat_id,
                    msg = message_id,
                    tier = tier.label(),
                    "reporting deletion from snapshot"
                );
                self.deliver_snapshot(&snapshot, &caption).await;
            }
            RecoveredContent::CachedMedia(kind, path) => {
                let caption = format!(
                    "{header}\n👤 {actor_html}\n<b>Media:</b> {}\n\n<b>Text:</b>\n<code>(none)</code>",
                    media_label(Some(kind)),
                );
                if !self.deliver_cached(kind, &path, &caption).await {
                    self.send_log_html(&format!(
                        "{caption}\n\n<i>(cached payload could not be re-sent)</i>"
                    ))
                    .await;
                }
            }
            RecoveredContent::Unavailable => {
                let caption = format!(
                    "{header}\n👤 {actor_html}\n<b>Media:</b> —\n\n<b>Text:</b>\n<code>(none)</code>\n\n<i>(no record in store or cache for message_id={message_id})</i>",
                );
                self.send_log_html(&caption).await;
            }
        }
    }

    async fn deliver_snapshot(&self, snapshot: &MessageSnapshot, caption: &str) {
        let Some(target) = self.owner.target_chat() else {
            tracing::info!(log = caption, "no owner configured, audit message dropped");
            return;
        };

        match (&snapshot.media_kind, &snapshot.media_ref) {
            (Some(MediaKind::VideoNote), Some(MediaRef::Platform(file_id))) => {
                // Caption first, then the note itself without one.
                self.send_log_html(caption).await;
                if let Err(e) = self
                    .client
                    .send_media_by_id(MediaKind::VideoNote, target, file_id, None)
                    .await
                {
                    tracing::warn!(error = %e, "video note re-send failed");
                    self.send_log_html("<i>(could not re-send the video note)</i>")
                        .await;
                }
            }
            (Some(kind), Some(MediaRef::Platform(file_id))) => {
                if let Err(e) = self
                    .client
                    .send_media_by_id(*kind, target, file_id, Some(caption))
                    .await
                {
                    tracing::warn!(error = %e, "media re-send failed, degrading to text");
                    self.send_log_html(caption).await;
                }
            }
            (Some(kind), Some(MediaRef::Local(path))) => {
                if let Err(e) = self
                    .client
                    .send_media_file(*kind, target, path, Some(caption))
                    .await
                {
                    tracing::warn!(error = %e, "local media upload failed, degrading to text");
                    self.send_log_html(caption).await;
                }
            }
            _ => {
                self.send_log_html(caption).await;
            }
        }
    }

    /// Re-send a cached payload; returns false when delivery failed
    async fn deliver_cached(&self, kind: MediaKind, path: &Path, caption: &str) -> bool {
        let Some(target) = self.owner.target_chat() else {
            tracing::info!(log = caption, "no owner configured, audit message dropped");
            return true;
        };

        if kind == MediaKind::VideoNote {
            self.send_log_html(caption).await;
            let muted = match media::make_muted_copy(path).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "mute transcode failed");
                    return false;
                }
            };
            return self
                .client
                .send_video_note_file(target, &muted, None)
                .await
                .map_err(|e| tracing::warn!(error = %e, "cached video note upload failed"))
                .is_ok();
        }

        self.client
            .send_media_file(kind, target, path, Some(caption))
            .await
            .map_err(|e| tracing::warn!(error = %e, "cached media upload failed"))
            .is_ok()
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() { "(none)" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MessageSnapshot;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn test_actor_link_prefers_actor() {
        let actor = User {
            id: 5,
            first_name: Some("Ann".to_string()),
            last_name: Some("O'Shea".to_string()),
            ..Default::default()
        };
        let link = actor_link(Some(&actor), Some(99), Some("fallback"));
        assert_eq!(link, r#"<a href="tg://user?id=5">Ann O'Shea</a>"#);
    }

    #[test]
    fn test_actor_link_fallbacks() {
        let link = actor_link(None, Some(99), Some("Chat <Name>"));
        assert_eq!(link, r#"<a href="tg://user?id=99">Chat &lt;Name&gt;</a>"#);

        assert_eq!(actor_link(None, None, None), "unknown");
    }

    fn fixture(
        with_snapshot: bool,
        with_cache_entry: bool,
    ) -> (tempfile::TempDir, SnapshotStore, MediaCache) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open_in_memory().unwrap();
        let cache = MediaCache::new(tmp.path().join("cache"));

        if with_snapshot {
            store
                .upsert(
                    &MessageSnapshot::new("", 1, 50, "from the store").with_media(
                        MediaKind::Photo,
                        MediaRef::Platform("fid".to_string()),
                    ),
                )
                .unwrap();
        }
        if with_cache_entry {
            let src = tmp.path().join("payload.jpg");
            std::fs::write(&src, b"jpeg").unwrap();
            cache
                .store_payload(1, 50, MediaKind::Photo, &src)
                .unwrap();
        }
        (tmp, store, cache)
    }

    #[test]
    fn test_recover_prefers_store_over_cache() {
        let (_tmp, store, cache) = fixture(true, true);
        match recover_content(&store, &cache, 10, "", 1, 50).unwrap() {
            RecoveredContent::Snapshot(snap, _) => assert_eq!(snap.text, "from the store"),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_recover_falls_through_to_cache() {
        let (_tmp, store, cache) = fixture(false, true);
        match recover_content(&store, &cache, 10, "", 1, 50).unwrap() {
            RecoveredContent::CachedMedia(kind, path) => {
                assert_eq!(kind, MediaKind::Photo);
                assert!(path.exists());
            }
            other => panic!("expected cached media, got {other:?}"),
        }
    }

    #[test]
    fn test_recover_total_miss() {
        let (_tmp, store, cache) = fixture(false, false);
        assert!(matches!(
            recover_content(&store, &cache, 10, "", 1, 50).unwrap(),
            RecoveredContent::Unavailable
        ));
    }
}
