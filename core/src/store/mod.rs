//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The resolver and tracker see it through the `ConfigSource` and
//! `ChangeSink` ports and never execute SQL directly.

mod change_log;
mod config_document;

pub use change_log::ChangeLogEntry;
pub use config_document::ConfigDocument;

use crate::error::EngineResult;
use rusqlite::Connection;

pub struct QuoteStore {
    conn: Connection,
}

impl QuoteStore {
    /// Open (or create) the quote database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only takes on real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_config_documents.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_change_log.sql"))?;
        Ok(())
    }
}
