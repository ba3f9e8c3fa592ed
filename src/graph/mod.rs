//! Lineage graph assembly.
//!
//! The graph merges two kinds of evidence about procedures and tables:
//!
//! ```text
//!  authoritative (procedure, table) pairs ──► USES   procedure → table
//!  procedure source text ──► sqlparser ──┬──► WRITES procedure → table
//!                                        └──► READS  table → procedure
//! ```
//!
//! Nodes are keyed by kind and name. Identical edges are stored once; distinct
//! relations between the same pair coexist.

mod assembler;
mod classify;
mod extract;
mod split;
mod types;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::LineageResult;
use crate::metadata::write_csv;

pub use assembler::{Assembly, GraphAssembler};
pub use classify::{
    classify_reference, Construct, TemporaryTableClassifier, DEFAULT_TEMPORARY_PATTERNS,
};
pub use extract::{extract_table_references, ExtractError, SourceDialect, TableReference};
pub use types::{DependencyEdge, EdgeRow, GraphNode, NodeKey, NodeKind, Relation};

/// Directed, relation-typed graph over tables and procedures.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    graph: DiGraph<GraphNode, Relation>,
    node_index: HashMap<NodeKey, NodeIndex>,
    classifier: TemporaryTableClassifier,
}

impl LineageGraph {
    pub fn new(classifier: TemporaryTableClassifier) -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            classifier,
        }
    }

    /// Get or create the node for `key`. Tables are tagged temporary on
    /// creation.
    pub fn get_or_create_node(&mut self, key: NodeKey) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&key) {
            return idx;
        }
        let temporary = key.is_table() && self.classifier.is_temporary(&key.name);
        let idx = self.graph.add_node(GraphNode {
            key: key.clone(),
            temporary,
        });
        self.node_index.insert(key, idx);
        idx
    }

    /// Add an edge unless an identical one exists. Returns whether it was new.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> bool {
        let from = self.get_or_create_node(edge.source);
        let to = self.get_or_create_node(edge.target);
        if self
            .graph
            .edges_connecting(from, to)
            .any(|e| *e.weight() == edge.relation)
        {
            return false;
        }
        self.graph.add_edge(from, to, edge.relation);
        true
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&GraphNode> {
        self.node_index.get(key).map(|&idx| &self.graph[idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Table names, sorted.
    pub fn tables(&self) -> Vec<&str> {
        self.names_of(NodeKind::Table, |_| true)
    }

    /// Procedure names, sorted.
    pub fn procedures(&self) -> Vec<&str> {
        self.names_of(NodeKind::Procedure, |_| true)
    }

    /// Tables tagged temporary, sorted.
    pub fn temporary_tables(&self) -> Vec<&str> {
        self.names_of(NodeKind::Table, |node| node.temporary)
    }

    fn names_of(&self, kind: NodeKind, keep: impl Fn(&GraphNode) -> bool) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .graph
            .node_weights()
            .filter(|node| node.key.kind == kind && keep(node))
            .map(|node| node.key.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Every edge, as a set. Two graphs built from the same evidence in any
    /// order have equal edge sets.
    pub fn edge_set(&self) -> BTreeSet<DependencyEdge> {
        self.graph
            .edge_references()
            .map(|e| DependencyEdge {
                source: self.graph[e.source()].key.clone(),
                target: self.graph[e.target()].key.clone(),
                relation: *e.weight(),
            })
            .collect()
    }

    /// Every edge, sorted.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.edge_set().into_iter().collect()
    }

    /// Tables a procedure's code writes, sorted.
    pub fn tables_written_by(&self, procedure: &str) -> Vec<&str> {
        self.neighbors(&NodeKey::procedure(procedure), Direction::Outgoing, Relation::Writes)
    }

    /// Tables a procedure's code reads, sorted.
    pub fn tables_read_by(&self, procedure: &str) -> Vec<&str> {
        self.neighbors(&NodeKey::procedure(procedure), Direction::Incoming, Relation::Reads)
    }

    /// Procedures whose code writes a table, sorted.
    pub fn writers_of(&self, table: &str) -> Vec<&str> {
        self.neighbors(&NodeKey::table(table), Direction::Incoming, Relation::Writes)
    }

    /// Procedures with an authoritative dependency on a table, sorted.
    pub fn users_of(&self, table: &str) -> Vec<&str> {
        self.neighbors(&NodeKey::table(table), Direction::Incoming, Relation::Uses)
    }

    fn neighbors(&self, key: &NodeKey, direction: Direction, relation: Relation) -> Vec<&str> {
        let Some(&idx) = self.node_index.get(key) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|e| *e.weight() == relation)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph[other].key.name.as_str()
            })
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Write the sorted edge list as CSV.
    pub fn write_edges_csv(&self, path: &Path) -> LineageResult<()> {
        let rows: Vec<EdgeRow> = self.edge_set().iter().map(EdgeRow::from).collect();
        write_csv(path, &rows)
    }
}
