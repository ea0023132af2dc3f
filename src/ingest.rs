//! Ingestion Facade - the single write path for observed messages
//!
//! Every message the dispatch loop sees (plain, business, or edited in
//! place) funnels through here: the snapshot upsert always happens and is
//! the operation whose failure matters; media caching is a best-effort
//! follow-up that can never undo the committed row.

use std::path::PathBuf;

use crate::cache::MediaCache;
use crate::snapshot::{MediaKind, MediaRef, MessageSnapshot};
use crate::storage::SnapshotStore;
use crate::telegram::{Message, TelegramClient};
use crate::Result;

pub struct Ingestor<'a> {
    store: &'a SnapshotStore,
    cache: &'a MediaCache,
    client: &'a TelegramClient,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a SnapshotStore, cache: &'a MediaCache, client: &'a TelegramClient) -> Self {
        Self {
            store,
            cache,
            client,
        }
    }

    /// Persist an observed message under the given scope.
    ///
    /// Messages with neither text nor media are skipped. When
    /// `cache_media` is set and the message carries media, a cache attempt
    /// follows the upsert; its failure is swallowed inside the cache.
    pub async fn record_message(
        &self,
        scope: &str,
        msg: &Message,
        cache_media: bool,
    ) -> Result<()> {
        let Some(chat_id) = msg.chat_id() else {
            return Ok(());
        };
        let text = msg.text_or_caption();
        let media = msg.media();
        if text.is_empty() && media.is_none() {
            return Ok(());
        }

        let mut snapshot = MessageSnapshot::new(scope, chat_id, msg.message_id, text);
        if let Some((kind, file_id)) = &media {
            snapshot = snapshot.with_media(*kind, MediaRef::Platform(file_id.clone()));
        }
        self.store.upsert(&snapshot)?;

        if cache_media {
            if let Some((kind, file_id)) = media {
                self.cache
                    .try_cache(
                        self.client,
                        chat_id,
                        msg.message_id,
                        kind,
                        &MediaRef::Platform(file_id),
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Persist a message whose payload already lives on this host (a URL
    /// download that never had a platform file id)
    pub fn record_local_media(
        &self,
        scope: &str,
        chat_id: i64,
        message_id: i64,
        text: &str,
        kind: MediaKind,
        path: PathBuf,
    ) -> Result<()> {
        let snapshot = MessageSnapshot::new(scope, chat_id, message_id, text)
            .with_media(kind, MediaRef::Local(path));
        self.store.upsert(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> (SnapshotStore, MediaCache, TelegramClient, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open_in_memory().unwrap();
        let cache = MediaCache::new(tmp.path().join("cache"));
        let client = TelegramClient::new("000:TEST").unwrap();
        (store, cache, client, tmp)
    }

    #[tokio::test]
    async fn test_record_text_message() {
        let (store, cache, client, _tmp) = parts();
        let ingestor = Ingestor::new(&store, &cache, &client);

        let msg: Message = serde_json::from_str(
            r#"{"message_id": 5, "chat": {"id": 77}, "text": " hello "}"#,
        )
        .unwrap();
        ingestor.record_message("", &msg, true).await.unwrap();

        let snap = store.get_exact("", 77, 5).unwrap().unwrap();
        assert_eq!(snap.text, "hello");
        assert!(!snap.has_media());
    }

    #[tokio::test]
    async fn test_empty_message_is_skipped() {
        let (store, cache, client, _tmp) = parts();
        let ingestor = Ingestor::new(&store, &cache, &client);

        let msg: Message =
            serde_json::from_str(r#"{"message_id": 6, "chat": {"id": 77}}"#).unwrap();
        ingestor.record_message("", &msg, true).await.unwrap();

        assert_eq!(store.count_snapshots().unwrap(), 0);
    }

    #[test]
    fn test_record_local_media() {
        let (store, cache, client, tmp) = parts();
        let ingestor = Ingestor::new(&store, &cache, &client);

        let path = tmp.path().join("video.mp4");
        ingestor
            .record_local_media("", 77, 9, "https://example.com/v", MediaKind::Document, path.clone())
            .unwrap();

        let snap = store.get_exact("", 77, 9).unwrap().unwrap();
        assert_eq!(snap.media_kind, Some(MediaKind::Document));
        assert_eq!(snap.media_ref, Some(MediaRef::Local(path)));
    }
}
