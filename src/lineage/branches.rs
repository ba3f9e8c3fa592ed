//! Compact branch rendering of a table's lineage.
//!
//! Each branch is one route from the table down to an origin:
//! `SP:SP_00012 → SP:SP_00003 → T:od_clientes`.

use crate::index::LineageIndex;

use super::TraceabilityRecord;

/// Render up to `limit` branches for `table`.
///
/// A table absent from the index is an origin: `T:<table>`.
pub fn compact_branches(index: &LineageIndex, table: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    match index.record(table) {
        Some(record) => {
            let mut route = Vec::new();
            branches_of(index, table, record, &mut route, limit)
        }
        None => vec![format!("T:{}", table)],
    }
}

fn branches_of<'a>(
    index: &'a LineageIndex,
    table: &'a str,
    record: &'a TraceabilityRecord,
    route: &mut Vec<&'a str>,
    limit: usize,
) -> Vec<String> {
    if record.is_origin {
        let origins: Vec<&str> = record.origin_tables.iter().map(String::as_str).collect();
        return vec![format!("T:{}", origins.join(","))];
    }

    route.push(table);
    let mut branches = Vec::new();

    'generators: for generator in &record.generating_procedures {
        for input in &generator.inputs_resolved {
            let tails = match index.record(&input.table) {
                Some(next) if !input.cycle_break && !route.contains(&input.table.as_str()) => {
                    branches_of(index, &input.table, next, route, limit)
                }
                _ => vec![format!("T:{}", input.table)],
            };
            for tail in tails {
                branches.push(format!("SP:{} → {}", generator.procedure_id, tail));
                if branches.len() >= limit {
                    break 'generators;
                }
            }
        }
    }

    route.pop();
    branches
}
