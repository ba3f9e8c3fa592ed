//! Derive table and procedure masters from authoritative dependencies.
//!
//! Ids are assigned in sorted-name order, so re-running over the same records
//! reproduces the same ids.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::{DependencyRecord, SourceRecord, TableMasterRecord};

/// One row of the procedure master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureMasterRecord {
    pub procedure_id: String,
    pub procedure_name: String,
    pub has_source: bool,
}

/// Normalized masters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Masters {
    pub tables: Vec<TableMasterRecord>,
    pub procedures: Vec<ProcedureMasterRecord>,
}

pub fn table_id(ordinal: usize) -> String {
    format!("tb_{:05}", ordinal)
}

pub fn procedure_id(ordinal: usize) -> String {
    format!("SP_{:05}", ordinal)
}

/// Assign surrogate ids to every table and procedure named by a dependency.
pub fn derive_masters(dependencies: &[DependencyRecord], sources: &[SourceRecord]) -> Masters {
    let with_source: HashSet<&str> = sources
        .iter()
        .filter(|s| s.text().is_some())
        .map(|s| s.procedure_name.as_str())
        .collect();

    let complete = || dependencies.iter().filter(|d| d.is_complete());
    let procedure_names: BTreeSet<&str> = complete().map(|d| d.procedure_name.as_str()).collect();
    let table_names: BTreeSet<&str> = complete().map(|d| d.table_name.as_str()).collect();

    Masters {
        tables: table_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| TableMasterRecord::new(table_id(i + 1), name))
            .collect(),
        procedures: procedure_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ProcedureMasterRecord {
                procedure_id: procedure_id(i + 1),
                procedure_name: name.to_string(),
                has_source: with_source.contains(name),
            })
            .collect(),
    }
}
