//! SQLite-backed nonce store.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{NonceError, NonceStore};
use crate::crypto::Nonce;

/// Durable nonce store.
pub struct SqliteNonceStore {
    conn: Mutex<Connection>,
}

impl SqliteNonceStore {
    /// Opens or creates a nonce database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NonceError> {
        Self::init(Connection::open(path)?)
    }

    /// Creates an in-memory nonce database (for testing).
    pub fn in_memory() -> Result<Self, NonceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, NonceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nonces (
                nonce BLOB PRIMARY KEY NOT NULL
            ) WITHOUT ROWID;",
        )?;
        Ok(SqliteNonceStore {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored nonces.
    pub fn count(&self) -> Result<u64, NonceError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM nonces", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl NonceStore for SqliteNonceStore {
    fn exists(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        let found = self
            .conn
            .lock()
            .query_row(
                "SELECT 1 FROM nonces WHERE nonce = ?1",
                params![&nonce.as_bytes()[..]],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn store(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO nonces (nonce) VALUES (?1)",
            params![&nonce.as_bytes()[..]],
        )?;
        Ok(inserted == 1)
    }
}
