//! SQLite-backed index cache.
//!
//! One row per table, JSON values, plus a `meta` table holding the schema
//! version and the fingerprint of the inputs the rows were built from.
//! A version mismatch clears the cache on open.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{IndexEntry, IndexError, IndexResult, IndexStore, LineageIndex};

/// Bump when the stored format changes.
const CACHE_VERSION: i32 = 1;

pub struct SqliteIndexStore {
    conn: Connection,
}

impl SqliteIndexStore {
    /// Open or create the cache database, creating parent directories.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    /// Open an in-memory cache (for testing).
    pub fn open_in_memory() -> IndexResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> IndexResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                table_name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        match stored_version {
            Some(v) if v == CACHE_VERSION => {}
            Some(_) => {
                debug!("index cache version changed; clearing");
                self.clear()?;
                self.set_meta("version", &CACHE_VERSION.to_string())?;
            }
            None => self.set_meta("version", &CACHE_VERSION.to_string())?,
        }
        Ok(())
    }

    fn set_meta(&self, key: &str, value: &str) -> IndexResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn meta(&self, key: &str) -> IndexResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Fingerprint of the stored rows, if any were saved.
    pub fn fingerprint(&self) -> IndexResult<Option<String>> {
        self.meta("fingerprint")
    }

    /// Drop every row and the fingerprint.
    pub fn clear(&self) -> IndexResult<()> {
        self.conn.execute("DELETE FROM entries", [])?;
        self.conn
            .execute("DELETE FROM meta WHERE key = 'fingerprint'", [])?;
        Ok(())
    }

    pub fn entry_count(&self) -> IndexResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl IndexStore for SqliteIndexStore {
    fn load(&self, fingerprint: &str) -> IndexResult<Option<LineageIndex>> {
        if self.fingerprint()?.as_deref() != Some(fingerprint) {
            return Ok(None);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT table_name, value FROM entries ORDER BY table_name")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let index = rows
            .into_iter()
            .map(|(table, json)| -> IndexResult<(String, IndexEntry)> {
                Ok((table, serde_json::from_str(&json)?))
            })
            .collect::<IndexResult<LineageIndex>>()?;
        Ok(Some(index))
    }

    fn save(&self, fingerprint: &str, index: &LineageIndex) -> IndexResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO entries (table_name, value) VALUES (?, ?)")?;
            for (table, entry) in index.iter() {
                insert.execute(params![table, serde_json::to_string(entry)?])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('fingerprint', ?)",
            params![fingerprint],
        )?;
        tx.commit()?;
        debug!(tables = index.len(), "saved index cache");
        Ok(())
    }
}
