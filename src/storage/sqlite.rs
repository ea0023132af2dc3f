//! SQLite storage implementation

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use super::schema;
use crate::snapshot::{MediaKind, MediaRef, MessageSnapshot};
use crate::{Error, Result};

const SNAPSHOT_COLUMNS: &str = "scope, chat_id, msg_id, ts, text, media_kind, media_ref";

/// SQLite-backed store of message snapshots.
///
/// The store only grows: normal operation never deletes rows, and a second
/// write under the same key fully replaces the earlier snapshot.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Insert or replace a snapshot (last write wins)
    pub fn upsert(&self, snapshot: &MessageSnapshot) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO snapshots (scope, chat_id, msg_id, ts, text, media_kind, media_ref)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                snapshot.scope,
                snapshot.chat_id,
                snapshot.message_id,
                snapshot.timestamp,
                snapshot.text,
                snapshot.media_kind.map(|k| k.as_str()),
                snapshot.media_ref.as_ref().map(|r| r.to_db_string()),
            ],
        )?;
        tracing::debug!(
            scope = %snapshot.scope,
            chat = snapshot.chat_id,
            msg = snapshot.message_id,
            media = ?snapshot.media_kind,
            "stored snapshot"
        );
        Ok(())
    }

    /// Point lookup on the full (scope, chat, message) key
    pub fn get_exact(
        &self,
        scope: &str,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<MessageSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE scope = ?1 AND chat_id = ?2 AND msg_id = ?3"
        );
        self.conn
            .query_row(&sql, params![scope, chat_id, message_id], |row| {
                self.row_to_snapshot(row)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Lookup ignoring scope; the most recently ingested match wins
    pub fn get_by_chat_message(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<MessageSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE chat_id = ?1 AND msg_id = ?2 \
             ORDER BY ts DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![chat_id, message_id], |row| {
                self.row_to_snapshot(row)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Lookup within `[message_id - radius, message_id + radius]`.
    ///
    /// Returns the snapshot whose message id is closest to the query id;
    /// equal distances resolve to the lowest message id so repeated runs
    /// pick the same row. `scope` restricts the search when given.
    pub fn get_nearby(
        &self,
        scope: Option<&str>,
        chat_id: i64,
        message_id: i64,
        radius: i64,
    ) -> Result<Option<MessageSnapshot>> {
        let lo = message_id - radius;
        let hi = message_id + radius;

        if let Some(scope) = scope {
            let sql = format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
                 WHERE scope = ?1 AND chat_id = ?2 AND msg_id BETWEEN ?3 AND ?4 \
                 ORDER BY ABS(msg_id - ?5) ASC, msg_id ASC LIMIT 1"
            );
            self.conn
                .query_row(&sql, params![scope, chat_id, lo, hi, message_id], |row| {
                    self.row_to_snapshot(row)
                })
                .optional()
                .map_err(Into::into)
        } else {
            let sql = format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM snapshots \
                 WHERE chat_id = ?1 AND msg_id BETWEEN ?2 AND ?3 \
                 ORDER BY ABS(msg_id - ?4) ASC, msg_id ASC LIMIT 1"
            );
            self.conn
                .query_row(&sql, params![chat_id, lo, hi, message_id], |row| {
                    self.row_to_snapshot(row)
                })
                .optional()
                .map_err(Into::into)
        }
    }

    /// Count all snapshots
    pub fn count_snapshots(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let with_media: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE media_kind IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let chats: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT chat_id) FROM snapshots", [], |row| {
                    row.get(0)
                })?;
        Ok(StoreStats {
            snapshots: self.count_snapshots()?,
            with_media: with_media as usize,
            chats: chats as usize,
        })
    }

    /// Helper to convert a row to a MessageSnapshot
    fn row_to_snapshot(&self, row: &rusqlite::Row) -> rusqlite::Result<MessageSnapshot> {
        let media_kind: Option<String> = row.get(5)?;
        let media_kind = media_kind
            .map(|s| {
                s.parse::<MediaKind>().map_err(|e: Error| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;
        let media_ref: Option<String> = row.get(6)?;

        Ok(MessageSnapshot {
            scope: row.get(0)?,
            chat_id: row.get(1)?,
            message_id: row.get(2)?,
            timestamp: row.get(3)?,
            text: row.get(4)?,
            media_kind,
            media_ref: media_ref.as_deref().map(MediaRef::from_db_string),
        })
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub snapshots: usize,
    pub with_media: usize,
    pub chats: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Snapshots: {}", self.snapshots)?;
        writeln!(f, "  With media: {}", self.with_media)?;
        writeln!(f, "  Chats: {}", self.chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(scope: &str, chat: i64, msg: i64, text: &str) -> MessageSnapshot {
        MessageSnapshot::new(scope, chat, msg, text)
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = SnapshotStore::open_in_memory().unwrap();

        store.upsert(&snap("", 1, 100, "first")).unwrap();
        store
            .upsert(
                &snap("", 1, 100, "second").with_media(
                    MediaKind::Photo,
                    MediaRef::Platform("fid".to_string()),
                ),
            )
            .unwrap();

        assert_eq!(store.count_snapshots().unwrap(), 1);
        let got = store.get_exact("", 1, 100).unwrap().unwrap();
        assert_eq!(got.text, "second");
        assert_eq!(got.media_kind, Some(MediaKind::Photo));
        assert_eq!(
            got.media_ref,
            Some(MediaRef::Platform("fid".to_string()))
        );
    }

    #[test]
    fn test_scope_isolation() {
        let store = SnapshotStore::open_in_memory().unwrap();

        store.upsert(&snap("A", 1, 100, "x")).unwrap();
        store.upsert(&snap("B", 1, 100, "y")).unwrap();

        assert_eq!(store.get_exact("A", 1, 100).unwrap().unwrap().text, "x");
        assert_eq!(store.get_exact("B", 1, 100).unwrap().unwrap().text, "y");
        assert_eq!(store.count_snapshots().unwrap(), 2);
    }

    #[test]
    fn test_get_by_chat_message_prefers_recent() {
        let store = SnapshotStore::open_in_memory().unwrap();

        store
            .upsert(&snap("old-scope", 1, 100, "stale").with_timestamp(1000))
            .unwrap();
        store
            .upsert(&snap("new-scope", 1, 100, "fresh").with_timestamp(2000))
            .unwrap();

        let got = store.get_by_chat_message(1, 100).unwrap().unwrap();
        assert_eq!(got.text, "fresh");
        assert_eq!(got.scope, "new-scope");
    }

    #[test]
    fn test_nearby_respects_radius() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.upsert(&snap("", 1, 55, "near")).unwrap();

        let hit = store.get_nearby(None, 1, 50, 10).unwrap();
        assert_eq!(hit.unwrap().message_id, 55);

        let miss = store.get_nearby(None, 1, 50, 3).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_nearby_tie_breaks_to_lowest_id() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.upsert(&snap("", 1, 48, "lower")).unwrap();
        store.upsert(&snap("", 1, 52, "upper")).unwrap();

        for _ in 0..5 {
            let got = store.get_nearby(None, 1, 50, 10).unwrap().unwrap();
            assert_eq!(got.message_id, 48);
        }
    }

    #[test]
    fn test_nearby_scoped_excludes_other_scopes() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.upsert(&snap("S", 1, 55, "scoped")).unwrap();
        store.upsert(&snap("T", 1, 51, "other")).unwrap();

        let got = store.get_nearby(Some("S"), 1, 50, 10).unwrap().unwrap();
        assert_eq!(got.scope, "S");
        assert_eq!(got.message_id, 55);
    }

    #[test]
    fn test_negative_ids_are_valid_keys() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.upsert(&snap("", -100123456, 0, "group")).unwrap();

        let got = store.get_exact("", -100123456, 0).unwrap();
        assert_eq!(got.unwrap().text, "group");
    }
}
