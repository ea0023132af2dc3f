//! Database schema definitions

/// SQL to create the snapshots table
///
/// One row per observed (scope, chat, message); upserts replace in place.
pub const CREATE_SNAPSHOTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    scope TEXT NOT NULL DEFAULT '',
    chat_id INTEGER NOT NULL,
    msg_id INTEGER NOT NULL,
    ts INTEGER NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    media_kind TEXT,
    media_ref TEXT,
    PRIMARY KEY (scope, chat_id, msg_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_snapshots_chat_msg ON snapshots(chat_id, msg_id)",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_media_kind ON snapshots(media_kind)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_SNAPSHOTS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
