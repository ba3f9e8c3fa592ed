//! Row types for the input documents and their loaders.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LineageError, LineageResult};

/// One authoritative dependency reported by the source database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub procedure_name: String,
    pub table_name: String,
    #[serde(default)]
    pub object_kind: String,
    #[serde(default)]
    pub relation_label: String,
}

impl DependencyRecord {
    pub fn new(procedure: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            procedure_name: procedure.into(),
            table_name: table.into(),
            object_kind: "SQL_STORED_PROCEDURE".to_string(),
            relation_label: "DEPENDENCY".to_string(),
        }
    }

    /// Both endpoints are present.
    pub fn is_complete(&self) -> bool {
        !self.procedure_name.trim().is_empty() && !self.table_name.trim().is_empty()
    }
}

/// Source text of one procedure. The text may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub procedure_name: String,
    #[serde(default)]
    pub object_kind: String,
    #[serde(default)]
    pub source_text: Option<String>,
}

impl SourceRecord {
    pub fn new(procedure: impl Into<String>, source: Option<&str>) -> Self {
        Self {
            procedure_name: procedure.into(),
            object_kind: "SQL_STORED_PROCEDURE".to_string(),
            source_text: source.map(str::to_string),
        }
    }

    /// The source text, if present and non-blank.
    pub fn text(&self) -> Option<&str> {
        self.source_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Enrichment metadata for one procedure.
///
/// `inputs` and `outputs` hold table ids from the table master. A value that
/// is not a known id but is a known table name is accepted as that table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureMetadata {
    pub procedure_id: String,
    pub procedure_name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub external_sources: bool,
    pub creates_tables: bool,
    pub review_flag: bool,
}

/// One row of the table master mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableMasterRecord {
    pub table_id: String,
    pub table_name: String,
}

impl TableMasterRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table_id: id.into(),
            table_name: name.into(),
        }
    }
}

/// Read every row of a headed CSV file.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> LineageResult<Vec<T>> {
    let file = File::open(path).map_err(|e| LineageError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(BufReader::new(file));

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| LineageError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Write rows as a headed CSV file, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> LineageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| LineageError::io(parent, e))?;
    }
    let to_csv_error = |source| LineageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(to_csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(to_csv_error)?;
    }
    writer.flush().map_err(|e| LineageError::io(path, e))
}

/// Read the authoritative dependency records, dropping incomplete rows.
pub fn read_dependencies(path: &Path) -> LineageResult<Vec<DependencyRecord>> {
    let rows: Vec<DependencyRecord> = read_csv(path)?;
    Ok(rows.into_iter().filter(DependencyRecord::is_complete).collect())
}

/// Read the procedure source collection.
pub fn read_sources(path: &Path) -> LineageResult<Vec<SourceRecord>> {
    read_csv(path)
}

/// Read the table master mapping.
pub fn read_table_master(path: &Path) -> LineageResult<Vec<TableMasterRecord>> {
    read_csv(path)
}

/// Read the procedure metadata document (a JSON array).
pub fn read_procedure_metadata(path: &Path) -> LineageResult<Vec<ProcedureMetadata>> {
    let file = File::open(path).map_err(|e| LineageError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LineageError::Json {
        path: path.to_path_buf(),
        source,
    })
}
