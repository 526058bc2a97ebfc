//! Durable message history backed by `SQLite`.
//!
//! Schema: one `messages` table with columns `id`, `from_client`,
//! `to_client`, `body`. `id` is an autoincrement primary key, so it also
//! gives insertion order.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, Row};
use skychat_core::{Message, NewMessage};

use crate::history::{HistoryError, HistoryStore};

const INIT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        from_client TEXT NOT NULL,
        to_client   TEXT NOT NULL,
        body        TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_client);
    CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_client);
";

const SELECT_COLUMNS: &str = "SELECT id, from_client, to_client, body FROM messages";

#[derive(Debug, Clone)]
pub struct SqliteHistory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Wrap an existing connection and make sure the schema exists.
    pub fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(INIT_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn.lock().map_err(|_| HistoryError::Poisoned)
    }

    fn select(
        &self,
        clause: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Message>, HistoryError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} {clause}");
        tracing::trace!(query = %sql, "history query");
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params, row_to_message)?;
        let messages = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        from: row.get(1)?,
        to: row.get(2)?,
        text: row.get(3)?,
    })
}

impl HistoryStore for SqliteHistory {
    fn store(&self, message: NewMessage) -> Result<i64, HistoryError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (from_client, to_client, body) VALUES (?1, ?2, ?3)",
            params![message.from, message.to, message.text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_by_sender(&self, name: &str) -> Result<Vec<Message>, HistoryError> {
        self.select("WHERE from_client = ?1 ORDER BY id", params![name])
    }

    fn query_by_recipient(&self, name: &str) -> Result<Vec<Message>, HistoryError> {
        self.select("WHERE to_client = ?1 ORDER BY id", params![name])
    }

    fn query_recent(&self, name: &str, limit: usize) -> Result<Vec<Message>, HistoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.select(
            "WHERE from_client = ?1 ORDER BY id DESC LIMIT ?2",
            params![name, limit],
        )
    }

    fn query_containing(&self, name: &str, word: &str) -> Result<Vec<Message>, HistoryError> {
        self.select(
            "WHERE from_client = ?1 AND instr(body, ?2) > 0 ORDER BY id",
            params![name, word],
        )
    }
}
