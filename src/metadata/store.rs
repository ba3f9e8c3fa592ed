//! Bidirectional table mapping and procedure lookup.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::InputPaths;
use crate::error::{InputKind, LineageResult};

use super::records::{read_procedure_metadata, read_table_master};
use super::{ProcedureMetadata, TableMasterRecord};

/// A table reference from metadata, resolved against the master mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    /// The reference is a known id, or a known name.
    Known { id: String, name: String },
    /// Absent from the master mapping; the raw reference stands in as name.
    Unknown(String),
}

impl TableRef {
    pub fn name(&self) -> &str {
        match self {
            TableRef::Known { name, .. } => name,
            TableRef::Unknown(raw) => raw,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            TableRef::Known { id, .. } => Some(id),
            TableRef::Unknown(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, TableRef::Known { .. })
    }
}

/// Read-only lookups over the table master and procedure metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    table_names: HashMap<String, String>,
    table_ids: HashMap<String, String>,
    procedures: Vec<ProcedureMetadata>,
    procedure_by_id: HashMap<String, usize>,
    procedure_by_name: HashMap<String, usize>,
}

impl MetadataStore {
    /// Build a store from already-loaded rows.
    ///
    /// Duplicate table ids or names keep the first row.
    pub fn new(tables: Vec<TableMasterRecord>, procedures: Vec<ProcedureMetadata>) -> Self {
        let mut store = Self::default();

        for row in tables {
            if store.table_names.contains_key(&row.table_id)
                || store.table_ids.contains_key(&row.table_name)
            {
                warn!(
                    table_id = %row.table_id,
                    table_name = %row.table_name,
                    "duplicate row in table master; keeping the first"
                );
                continue;
            }
            store
                .table_names
                .insert(row.table_id.clone(), row.table_name.clone());
            store.table_ids.insert(row.table_name, row.table_id);
        }

        for (idx, procedure) in procedures.iter().enumerate() {
            store
                .procedure_by_id
                .entry(procedure.procedure_id.to_lowercase())
                .or_insert(idx);
            store
                .procedure_by_name
                .entry(procedure.procedure_name.clone())
                .or_insert(idx);
        }
        store.procedures = procedures;

        debug!(
            tables = store.table_names.len(),
            procedures = store.procedures.len(),
            "metadata store ready"
        );
        store
    }

    /// Load the table master and procedure metadata.
    ///
    /// Fails with `MissingInputFile` when either document is absent.
    pub fn load(paths: &InputPaths) -> LineageResult<Self> {
        paths.require(&[InputKind::TableMaster, InputKind::Metadata])?;
        let tables = read_table_master(&paths.tables)?;
        let procedures = read_procedure_metadata(&paths.metadata)?;
        Ok(Self::new(tables, procedures))
    }

    pub fn get_table_name(&self, id: &str) -> Option<&str> {
        self.table_names.get(id).map(String::as_str)
    }

    pub fn get_table_id(&self, name: &str) -> Option<&str> {
        self.table_ids.get(name).map(String::as_str)
    }

    /// Find a procedure by id (case-insensitive), then by exact name.
    pub fn find_procedure(&self, name_or_id: &str) -> Option<&ProcedureMetadata> {
        self.procedure_by_id
            .get(&name_or_id.to_lowercase())
            .or_else(|| self.procedure_by_name.get(name_or_id))
            .map(|&idx| &self.procedures[idx])
    }

    /// Resolve a metadata table reference.
    pub fn resolve_table_ref(&self, reference: &str) -> TableRef {
        if let Some(name) = self.table_names.get(reference) {
            return TableRef::Known {
                id: reference.to_string(),
                name: name.clone(),
            };
        }
        if let Some(id) = self.table_ids.get(reference) {
            return TableRef::Known {
                id: id.clone(),
                name: reference.to_string(),
            };
        }
        TableRef::Unknown(reference.to_string())
    }

    /// All procedures, in document order.
    pub fn procedures(&self) -> &[ProcedureMetadata] {
        &self.procedures
    }

    pub fn table_count(&self) -> usize {
        self.table_names.len()
    }
}
