//! Persistence of the traceability index.
//!
//! The index is a JSON document keyed by table name:
//!
//! ```text
//! {
//!   "derived": {
//!     "table_id": "tb_00002",
//!     "traceability": { "is_origin": false, "origin_tables": ["raw"], "depth": 1, ... }
//!   }
//! }
//! ```
//!
//! Keys and set-valued fields are sorted, so identical inputs produce
//! byte-identical documents. Two stores implement [`IndexStore`]:
//!
//! - [`JsonIndexStore`]: the published document, written atomically
//! - [`SqliteIndexStore`]: a per-table cache, stored in `~/.tributary/index.db`
//!   by default
//!
//! Both are keyed by an input fingerprint (see [`compute_hash`]) and return
//! nothing when the fingerprint differs. There is no partial invalidation.

mod hash;
mod json;
mod sqlite;

pub use hash::compute_hash;
pub use json::JsonIndexStore;
pub use sqlite::SqliteIndexStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::lineage::TraceabilityRecord;
use crate::metadata::MetadataStore;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl IndexError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type IndexResult<T> = Result<T, IndexError>;

/// One table of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Surrogate id from the table master; `None` for placeholder tables.
    pub table_id: Option<String>,
    pub traceability: TraceabilityRecord,
}

/// The complete traceability index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl LineageIndex {
    /// Attach surrogate ids to resolved records.
    pub fn from_records(
        records: BTreeMap<String, TraceabilityRecord>,
        store: &MetadataStore,
    ) -> Self {
        let entries = records
            .into_iter()
            .map(|(table, traceability)| {
                let table_id = store.get_table_id(&table).map(str::to_string);
                (
                    table,
                    IndexEntry {
                        table_id,
                        traceability,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, table: &str) -> Option<&IndexEntry> {
        self.entries.get(table)
    }

    pub fn record(&self, table: &str) -> Option<&TraceabilityRecord> {
        self.entries.get(table).map(|entry| &entry.traceability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_pretty(&self) -> IndexResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl FromIterator<(String, IndexEntry)> for LineageIndex {
    fn from_iter<I: IntoIterator<Item = (String, IndexEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Fingerprint-keyed storage for a complete index.
pub trait IndexStore {
    /// The stored index, if it was saved under `fingerprint`.
    fn load(&self, fingerprint: &str) -> IndexResult<Option<LineageIndex>>;

    /// Replace the stored index.
    fn save(&self, fingerprint: &str, index: &LineageIndex) -> IndexResult<()>;
}
