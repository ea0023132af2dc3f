//! Media Cache - filesystem store of downloaded payloads
//!
//! Platform file references expire once a message is deleted, so media that
//! should survive deletion has to be copied out while the reference is still
//! valid. The cache is strictly best-effort: the snapshot row is the record
//! of truth and has already committed by the time a payload is cached.
//!
//! ## Storage Structure
//! ```text
//! <cache_root>/
//!   <chat_id>/
//!     {msg_id}.{ext}    payload (".bin" when the source name has no extension)
//!     {msg_id}.json     sidecar (kind, file name, cache timestamp)
//! ```
//!
//! Payload and sidecar age out independently under the eviction sweep; a
//! sidecar whose payload is gone reads as a miss, never as an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::snapshot::{MediaKind, MediaRef, unix_now};
use crate::telegram::TelegramClient;
use crate::{Error, Result};

/// Default retention for cached payloads
pub const DEFAULT_CACHE_TTL_DAYS: u64 = 7;

/// Sidecar metadata written next to each cached payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    media_kind: MediaKind,
    file: String,
    cached_at: i64,
}

/// Filesystem-backed media cache addressed by (chat, message)
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chat_dir(&self, chat_id: i64) -> Result<PathBuf> {
        let dir = self.root.join(chat_id.to_string());
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    fn sidecar_path(&self, chat_id: i64, message_id: i64) -> PathBuf {
        self.root
            .join(chat_id.to_string())
            .join(format!("{message_id}.json"))
    }

    /// Payload file name for a message, keeping the source extension
    fn payload_name(message_id: i64, src_name: &str) -> String {
        let ext = Path::new(src_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("bin");
        format!("{message_id}.{ext}")
    }

    /// Copy an already-local payload into the cache and write its sidecar
    pub fn store_payload(
        &self,
        chat_id: i64,
        message_id: i64,
        kind: MediaKind,
        src: &Path,
    ) -> Result<PathBuf> {
        let src_name = src
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let dir = self.chat_dir(chat_id)?;
        let file = Self::payload_name(message_id, src_name);
        let dst = dir.join(&file);

        std::fs::copy(src, &dst)?;

        let sidecar = Sidecar {
            media_kind: kind,
            file,
            cached_at: unix_now(),
        };
        std::fs::write(
            self.sidecar_path(chat_id, message_id),
            serde_json::to_string(&sidecar)?,
        )?;

        Ok(dst)
    }

    /// Best-effort caching of a media payload.
    ///
    /// Resolves a platform reference through the client (or copies a local
    /// one), then stores payload + sidecar. Every failure is swallowed here;
    /// the snapshot upsert must never be affected by a caching problem.
    pub async fn try_cache(
        &self,
        client: &TelegramClient,
        chat_id: i64,
        message_id: i64,
        kind: MediaKind,
        media_ref: &MediaRef,
    ) {
        match self
            .cache_inner(client, chat_id, message_id, kind, media_ref)
            .await
        {
            Ok(path) => {
                tracing::debug!(chat = chat_id, msg = message_id, kind = %kind, path = %path.display(), "cached media");
            }
            Err(e) => {
                tracing::warn!(chat = chat_id, msg = message_id, kind = %kind, error = %e, "media cache attempt failed");
            }
        }
    }

    async fn cache_inner(
        &self,
        client: &TelegramClient,
        chat_id: i64,
        message_id: i64,
        kind: MediaKind,
        media_ref: &MediaRef,
    ) -> Result<PathBuf> {
        let src = match media_ref {
            MediaRef::Platform(file_id) => {
                let (url, file_name) = client.get_file(file_id).await?;
                client.download_file(&url, &file_name).await?
            }
            MediaRef::Local(path) => path.clone(),
        };
        if !src.exists() {
            return Err(Error::Download(format!(
                "payload vanished before caching: {}",
                src.display()
            )));
        }
        self.store_payload(chat_id, message_id, kind, &src)
    }

    /// Look up a cached payload.
    ///
    /// Missing sidecar, unparsable sidecar, and missing payload all read as
    /// a miss.
    pub fn try_fetch(&self, chat_id: i64, message_id: i64) -> Option<(MediaKind, PathBuf)> {
        let meta_path = self.sidecar_path(chat_id, message_id);
        let raw = std::fs::read_to_string(meta_path).ok()?;
        let sidecar: Sidecar = serde_json::from_str(&raw).ok()?;

        let payload = self.root.join(chat_id.to_string()).join(&sidecar.file);
        if !payload.exists() {
            tracing::debug!(chat = chat_id, msg = message_id, "sidecar without payload, treating as miss");
            return None;
        }
        Some((sidecar.media_kind, payload))
    }

    /// Remove every cache file older than the retention window.
    ///
    /// Sidecars are swept by the same age rule; an orphaned sidecar between
    /// sweeps is harmless because `try_fetch` treats it as a miss.
    pub fn evict(&self, retention: Duration) -> usize {
        if !self.root.is_dir() {
            return 0;
        }

        let mut removed = 0;
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let expired = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|mtime| mtime.elapsed().ok())
                .map(|age| age > retention)
                .unwrap_or(false);
            if expired && std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }

        tracing::info!(removed, root = %self.root.display(), "cache eviction sweep");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::time::SystemTime;

    const DAY: u64 = 86_400;

    fn cache_with_payload(msg_id: i64) -> (tempfile::TempDir, MediaCache, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("clip.mp4");
        std::fs::write(&src, b"payload bytes").unwrap();

        let cache = MediaCache::new(tmp.path().join("cache"));
        let stored = cache
            .store_payload(7, msg_id, MediaKind::Video, &src)
            .unwrap();
        (tmp, cache, stored)
    }

    fn set_mtime(path: &Path, age: Duration) {
        let f = File::options().write(true).open(path).unwrap();
        f.set_times(FileTimes::new().set_modified(SystemTime::now() - age))
            .unwrap();
    }

    #[test]
    fn test_store_then_fetch() {
        let (_tmp, cache, stored) = cache_with_payload(42);
        assert!(stored.ends_with("7/42.mp4"));

        let (kind, path) = cache.try_fetch(7, 42).unwrap();
        assert_eq!(kind, MediaKind::Video);
        assert_eq!(path, stored);
    }

    #[test]
    fn test_extension_defaults_to_bin() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("blob");
        std::fs::write(&src, b"x").unwrap();

        let cache = MediaCache::new(tmp.path().join("cache"));
        let stored = cache
            .store_payload(1, 5, MediaKind::Document, &src)
            .unwrap();
        assert!(stored.ends_with("1/5.bin"));
    }

    #[test]
    fn test_fetch_without_payload_is_miss() {
        let (_tmp, cache, stored) = cache_with_payload(42);
        std::fs::remove_file(&stored).unwrap();

        assert!(cache.try_fetch(7, 42).is_none());
    }

    #[test]
    fn test_fetch_with_corrupt_sidecar_is_miss() {
        let (_tmp, cache, _stored) = cache_with_payload(42);
        std::fs::write(cache.sidecar_path(7, 42), "not json").unwrap();

        assert!(cache.try_fetch(7, 42).is_none());
    }

    #[test]
    fn test_fetch_unknown_key_is_miss() {
        let (_tmp, cache, _stored) = cache_with_payload(42);
        assert!(cache.try_fetch(7, 43).is_none());
        assert!(cache.try_fetch(8, 42).is_none());
    }

    #[test]
    fn test_evict_removes_only_expired_files() {
        let (_tmp, cache, stored) = cache_with_payload(42);
        let sidecar = cache.sidecar_path(7, 42);

        // Payload just past the window, sidecar one second inside it.
        set_mtime(&stored, Duration::from_secs(7 * DAY + 1));
        set_mtime(&sidecar, Duration::from_secs(7 * DAY - 1));

        let removed = cache.evict(Duration::from_secs(7 * DAY));
        assert_eq!(removed, 1);
        assert!(!stored.exists());
        assert!(sidecar.exists());

        // The orphaned sidecar now reads as a miss.
        assert!(cache.try_fetch(7, 42).is_none());
    }

    #[test]
    fn test_evict_on_missing_root_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = MediaCache::new(tmp.path().join("never-created"));
        assert_eq!(cache.evict(Duration::from_secs(DAY)), 0);
    }
}
