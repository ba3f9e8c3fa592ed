//! Summary statistics over a traceability index.

use std::fmt;

use serde::Serialize;

use crate::index::LineageIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_tables: usize,
    pub origin_tables: usize,
    pub generated_tables: usize,
    /// Sum over produced tables of their generating procedures.
    pub generator_relations: usize,
    pub max_depth: usize,
    /// Produced tables with the most origin tables, largest first.
    pub most_complex: Vec<(String, usize)>,
    /// Produced tables that reach themselves: they sit on a produce cycle
    /// and the break left them in their own origin set.
    pub cyclic_tables: usize,
}

impl IndexStats {
    pub fn compute(index: &LineageIndex, top: usize) -> Self {
        let mut stats = IndexStats {
            total_tables: index.len(),
            origin_tables: 0,
            generated_tables: 0,
            generator_relations: 0,
            max_depth: 0,
            most_complex: Vec::new(),
            cyclic_tables: 0,
        };

        for (table, entry) in index.iter() {
            let record = &entry.traceability;
            if record.is_origin {
                stats.origin_tables += 1;
                continue;
            }
            stats.generated_tables += 1;
            stats.generator_relations += record.generating_procedures.len();
            stats.max_depth = stats.max_depth.max(record.depth);
            if record.origin_tables.contains(table) {
                stats.cyclic_tables += 1;
            }
            stats
                .most_complex
                .push((table.to_string(), record.origin_tables.len()));
        }

        // Stable: ties keep name order.
        stats.most_complex.sort_by(|a, b| b.1.cmp(&a.1));
        stats.most_complex.truncate(top);
        stats
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tables in index:      {}", self.total_tables)?;
        writeln!(f, "Origin tables:        {}", self.origin_tables)?;
        writeln!(f, "Generated tables:     {}", self.generated_tables)?;
        writeln!(f, "Generator relations:  {}", self.generator_relations)?;
        writeln!(f, "Maximum depth:        {}", self.max_depth)?;
        writeln!(f, "Tables on cycles:     {}", self.cyclic_tables)?;
        if !self.most_complex.is_empty() {
            writeln!(f, "Most complex:")?;
            for (table, origins) in &self.most_complex {
                writeln!(f, "  {}: {} origin tables", table, origins)?;
            }
        }
        Ok(())
    }
}
