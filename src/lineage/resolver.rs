//! Bottom-up traceability resolution.
//!
//! The resolver walks from a table to the procedures declaring it as output,
//! then recursively into each procedure's declared inputs. Results are kept in
//! two tiers:
//!
//! - `completed`: records whose resolution never hit a cycle break. These are
//!   independent of the path they were reached from and are reused forever.
//! - per top-level call: records that did hit a cycle break. They depend on
//!   which table resolution started from, so they are memoized only for the
//!   current call (`ResolveScope::local`) and, for the entry table itself, in
//!   `by_entry`.
//!
//! Because every query takes the same route, `resolve(t)` and
//! `resolve_all()[t]` always agree, whatever order tables are queried in.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info, warn};

use crate::error::Diagnostic;
use crate::metadata::MetadataStore;

use super::record::{GeneratingProcedure, ResolvedInput, TraceabilityRecord};

/// A procedure declaring some table as output, with name-resolved inputs.
#[derive(Debug, Clone)]
struct Generator {
    procedure_id: String,
    procedure_name: String,
    inputs: Vec<String>,
    external_sources: bool,
    creates_tables: bool,
}

/// Reverse adjacency: table name → procedures producing it.
#[derive(Debug, Default)]
struct ProduceIndex {
    producers: BTreeMap<String, Vec<Generator>>,
    unknown_references: BTreeSet<Diagnostic>,
}

impl ProduceIndex {
    fn build(store: &MetadataStore) -> Self {
        let mut index = Self::default();

        for procedure in store.procedures() {
            let label = if procedure.procedure_id.is_empty() {
                procedure.procedure_name.as_str()
            } else {
                procedure.procedure_id.as_str()
            };
            let mut resolve = |reference: &String| {
                let table = store.resolve_table_ref(reference);
                if !table.is_known() {
                    warn!(procedure = label, reference = %reference, "unknown table reference");
                    index
                        .unknown_references
                        .insert(Diagnostic::UnknownTableReference {
                            procedure: label.to_string(),
                            reference: reference.clone(),
                        });
                }
                table.name().to_string()
            };

            let inputs: Vec<String> = procedure.inputs.iter().map(&mut resolve).collect();
            let outputs: Vec<String> = procedure.outputs.iter().map(&mut resolve).collect();

            for output in outputs {
                let generators = index.producers.entry(output).or_default();
                if generators
                    .iter()
                    .any(|g| g.procedure_id == procedure.procedure_id)
                {
                    continue;
                }
                generators.push(Generator {
                    procedure_id: procedure.procedure_id.clone(),
                    procedure_name: procedure.procedure_name.clone(),
                    inputs: inputs.clone(),
                    external_sources: procedure.external_sources,
                    creates_tables: procedure.creates_tables,
                });
            }
        }

        index
    }

    fn generators(&self, table: &str) -> Option<&[Generator]> {
        self.producers.get(table).map(Vec::as_slice)
    }
}

/// State of one top-level resolution.
struct ResolveScope<'a> {
    entry: &'a str,
    in_progress: HashSet<String>,
    local: HashMap<String, TraceabilityRecord>,
}

impl<'a> ResolveScope<'a> {
    fn new(entry: &'a str) -> Self {
        Self {
            entry,
            in_progress: HashSet::new(),
            local: HashMap::new(),
        }
    }
}

/// A record plus how it was obtained.
struct Outcome {
    record: TraceabilityRecord,
    /// Some cycle break happened at or below this table.
    tainted: bool,
    /// This record is itself the synthetic cycle-break origin.
    broken: bool,
}

#[derive(Debug, Default)]
struct Caches {
    completed: HashMap<String, TraceabilityRecord>,
    by_entry: HashMap<String, TraceabilityRecord>,
    cycles: BTreeSet<Diagnostic>,
}

/// Memoized resolver over procedure metadata.
#[derive(Debug)]
pub struct TraceabilityResolver {
    index: ProduceIndex,
    caches: Caches,
}

impl TraceabilityResolver {
    pub fn new(store: &MetadataStore) -> Self {
        let index = ProduceIndex::build(store);
        debug!(produced = index.producers.len(), "built produce index");
        Self {
            index,
            caches: Caches::default(),
        }
    }

    /// Resolve one table. Tables nothing produces resolve to themselves as
    /// origin, depth 0.
    pub fn resolve(&mut self, table: &str) -> TraceabilityRecord {
        if let Some(record) = self.caches.completed.get(table) {
            return record.clone();
        }
        if let Some(record) = self.caches.by_entry.get(table) {
            return record.clone();
        }

        let mut scope = ResolveScope::new(table);
        let outcome = resolve_in(&self.index, &mut self.caches, &mut scope, table);
        if outcome.tainted {
            self.caches
                .by_entry
                .insert(table.to_string(), outcome.record.clone());
        }
        outcome.record
    }

    /// Resolve every produced table, keyed and iterated in name order.
    pub fn resolve_all(&mut self) -> BTreeMap<String, TraceabilityRecord> {
        let tables: Vec<String> = self.index.producers.keys().cloned().collect();
        let mut resolved = BTreeMap::new();
        for table in tables {
            let record = self.resolve(&table);
            resolved.insert(table, record);
        }
        info!(
            tables = resolved.len(),
            cycle_breaks = self.caches.cycles.len(),
            "resolved traceability index"
        );
        resolved
    }

    /// Whether some procedure declares `table` as output.
    pub fn is_produced(&self, table: &str) -> bool {
        self.index.producers.contains_key(table)
    }

    /// Tables declared as output by some procedure, sorted.
    pub fn produced_tables(&self) -> Vec<&str> {
        self.index.producers.keys().map(String::as_str).collect()
    }

    /// Unknown references found in metadata plus cycle breaks observed so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.index
            .unknown_references
            .iter()
            .chain(self.caches.cycles.iter())
            .cloned()
            .collect()
    }

    /// Tables taking part in a produce cycle (input → output), sorted.
    pub fn cyclic_tables(&self) -> BTreeSet<String> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for (output, generators) in &self.index.producers {
            let names = std::iter::once(output).chain(generators.iter().flat_map(|g| &g.inputs));
            for name in names {
                nodes
                    .entry(name.as_str())
                    .or_insert_with(|| graph.add_node(name.as_str()));
            }
        }
        for (output, generators) in &self.index.producers {
            let to = nodes[output.as_str()];
            for input in generators.iter().flat_map(|g| &g.inputs) {
                graph.update_edge(nodes[input.as_str()], to, ());
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .flatten()
            .map(|idx| graph[idx].to_string())
            .collect()
    }
}

fn resolve_in(
    index: &ProduceIndex,
    caches: &mut Caches,
    scope: &mut ResolveScope<'_>,
    table: &str,
) -> Outcome {
    if let Some(record) = caches.completed.get(table) {
        return Outcome {
            record: record.clone(),
            tainted: false,
            broken: false,
        };
    }
    if let Some(record) = scope.local.get(table) {
        return Outcome {
            record: record.clone(),
            tainted: true,
            broken: false,
        };
    }
    if scope.in_progress.contains(table) {
        debug!(entry = scope.entry, table, "cycle broken");
        caches.cycles.insert(Diagnostic::CyclicDependency {
            entry: scope.entry.to_string(),
            table: table.to_string(),
        });
        return Outcome {
            record: TraceabilityRecord::origin(table),
            tainted: true,
            broken: true,
        };
    }

    let Some(generators) = index.generators(table) else {
        let record = TraceabilityRecord::origin(table);
        caches.completed.insert(table.to_string(), record.clone());
        return Outcome {
            record,
            tainted: false,
            broken: false,
        };
    };

    scope.in_progress.insert(table.to_string());
    let mut tainted = false;
    let mut origin_tables = BTreeSet::new();
    let mut entries = Vec::with_capacity(generators.len());

    for generator in generators {
        let mut depth_contribution = 1;
        let mut inputs_resolved = Vec::with_capacity(generator.inputs.len());

        for input in &generator.inputs {
            let outcome = resolve_in(index, caches, scope, input);
            tainted |= outcome.tainted;
            depth_contribution = depth_contribution.max(outcome.record.depth + 1);
            origin_tables.extend(outcome.record.origin_tables.iter().cloned());
            inputs_resolved.push(ResolvedInput {
                table: input.clone(),
                depth: outcome.record.depth,
                is_origin: outcome.record.is_origin,
                cycle_break: outcome.broken,
            });
        }

        entries.push(GeneratingProcedure {
            procedure_id: generator.procedure_id.clone(),
            procedure_name: generator.procedure_name.clone(),
            inputs: generator.inputs.clone(),
            inputs_resolved,
            external_sources: generator.external_sources,
            creates_tables: generator.creates_tables,
            depth_contribution,
        });
    }
    scope.in_progress.remove(table);

    let record = TraceabilityRecord::produced(entries, origin_tables);
    if tainted {
        scope.local.insert(table.to_string(), record.clone());
    } else {
        caches.completed.insert(table.to_string(), record.clone());
    }
    Outcome {
        record,
        tainted,
        broken: false,
    }
}
