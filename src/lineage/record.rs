//! Per-table traceability records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The upstream closure of one table.
///
/// `depth == 0` exactly when `is_origin`; otherwise `depth` is the largest
/// `depth_contribution` among the generating procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceabilityRecord {
    pub is_origin: bool,
    pub origin_tables: BTreeSet<String>,
    pub depth: usize,
    pub generating_procedures: Vec<GeneratingProcedure>,
}

impl TraceabilityRecord {
    /// A table nothing produces.
    pub fn origin(table: &str) -> Self {
        Self {
            is_origin: true,
            origin_tables: BTreeSet::from([table.to_string()]),
            depth: 0,
            generating_procedures: Vec::new(),
        }
    }

    /// Combine generator entries into a produced table's record.
    pub fn produced(
        generating_procedures: Vec<GeneratingProcedure>,
        origin_tables: BTreeSet<String>,
    ) -> Self {
        let depth = generating_procedures
            .iter()
            .map(|g| g.depth_contribution)
            .max()
            .unwrap_or(1);
        Self {
            is_origin: false,
            origin_tables,
            depth,
            generating_procedures,
        }
    }
}

/// One procedure declaring the table as output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratingProcedure {
    pub procedure_id: String,
    pub procedure_name: String,
    /// Declared inputs, name-resolved, in declaration order.
    pub inputs: Vec<String>,
    pub inputs_resolved: Vec<ResolvedInput>,
    pub external_sources: bool,
    pub creates_tables: bool,
    /// `1 + max(input depth)`, or 1 for a procedure without inputs.
    pub depth_contribution: usize,
}

/// Resolution summary of one declared input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInput {
    pub table: String,
    pub depth: usize,
    pub is_origin: bool,
    /// The input was still being resolved further up the path; its record
    /// here is the synthetic origin that broke the cycle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cycle_break: bool,
}
