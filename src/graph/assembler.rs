//! Builds a [`LineageGraph`] from dependency records and procedure sources.

use tracing::{debug, info, warn};

use crate::error::Diagnostic;
use crate::metadata::{DependencyRecord, SourceRecord};

use super::extract::{extract_table_references, SourceDialect};
use super::{DependencyEdge, LineageGraph, Relation, TemporaryTableClassifier};

/// Result of an assembly run.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub graph: LineageGraph,
    /// One `UnparsableProcedureSource` per procedure with no parsable statement.
    pub diagnostics: Vec<Diagnostic>,
    /// Procedures whose source was parsed successfully.
    pub parsed_procedures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    dialect: SourceDialect,
    classifier: TemporaryTableClassifier,
}

impl GraphAssembler {
    pub fn new(dialect: SourceDialect, classifier: TemporaryTableClassifier) -> Self {
        Self {
            dialect,
            classifier,
        }
    }

    /// Merge authoritative pairs with code-derived read/write edges.
    ///
    /// Statements that fail to parse are skipped. A source with no parsable
    /// statement leaves its procedure with only its authoritative edges.
    pub fn assemble(
        &self,
        dependencies: &[DependencyRecord],
        sources: &[SourceRecord],
    ) -> Assembly {
        let mut graph = LineageGraph::new(self.classifier.clone());
        let mut diagnostics = Vec::new();
        let mut parsed_procedures = 0;

        for dep in dependencies.iter().filter(|d| d.is_complete()) {
            graph.add_edge(DependencyEdge::uses(&dep.procedure_name, &dep.table_name));
        }

        for source in sources {
            let Some(text) = source.text() else {
                continue;
            };
            let procedure = source.procedure_name.as_str();
            match extract_table_references(text, self.dialect) {
                Ok(references) => {
                    parsed_procedures += 1;
                    debug!(procedure, references = references.len(), "parsed procedure source");
                    for reference in references {
                        let edge = match reference.access {
                            Relation::Writes => DependencyEdge::writes(procedure, &reference.table),
                            Relation::Reads => DependencyEdge::reads(&reference.table, procedure),
                            Relation::Uses => DependencyEdge::uses(procedure, &reference.table),
                        };
                        graph.add_edge(edge);
                    }
                }
                Err(err) => {
                    warn!(procedure, error = %err, "could not parse procedure source");
                    diagnostics.push(Diagnostic::UnparsableProcedureSource {
                        procedure: procedure.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            parsed = parsed_procedures,
            unparsable = diagnostics.len(),
            "assembled lineage graph"
        );

        Assembly {
            graph,
            diagnostics,
            parsed_procedures,
        }
    }
}
