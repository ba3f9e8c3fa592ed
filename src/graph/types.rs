//! Node and edge types of the lineage graph.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a procedure relates to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    /// Authoritative dependency, procedure → table, direction unknown.
    Uses,
    /// Code-derived read, table → procedure.
    Reads,
    /// Code-derived write, procedure → table.
    Writes,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Uses => write!(f, "USES"),
            Relation::Reads => write!(f, "READS"),
            Relation::Writes => write!(f, "WRITES"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Table,
    Procedure,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Table => write!(f, "table"),
            NodeKind::Procedure => write!(f, "procedure"),
        }
    }
}

/// Identity of a graph node. Tables and procedures live in separate
/// namespaces, so a table and a procedure may share a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeKey {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Table,
            name: name.into(),
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Procedure,
            name: name.into(),
        }
    }

    pub fn is_table(&self) -> bool {
        self.kind == NodeKind::Table
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Table => write!(f, "T:{}", self.name),
            NodeKind::Procedure => write!(f, "SP:{}", self.name),
        }
    }
}

/// Node weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub key: NodeKey,
    /// Name matched a temporary-table pattern. Always false for procedures.
    pub temporary: bool,
}

/// A directed, relation-typed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: NodeKey,
    pub target: NodeKey,
    pub relation: Relation,
}

impl DependencyEdge {
    pub fn uses(procedure: &str, table: &str) -> Self {
        Self {
            source: NodeKey::procedure(procedure),
            target: NodeKey::table(table),
            relation: Relation::Uses,
        }
    }

    pub fn reads(table: &str, procedure: &str) -> Self {
        Self {
            source: NodeKey::table(table),
            target: NodeKey::procedure(procedure),
            relation: Relation::Reads,
        }
    }

    pub fn writes(procedure: &str, table: &str) -> Self {
        Self {
            source: NodeKey::procedure(procedure),
            target: NodeKey::table(table),
            relation: Relation::Writes,
        }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.relation, self.target)
    }
}

/// One row of the edge CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub source_kind: NodeKind,
    pub target: String,
    pub target_kind: NodeKind,
    pub relation: Relation,
}

impl From<&DependencyEdge> for EdgeRow {
    fn from(edge: &DependencyEdge) -> Self {
        Self {
            source: edge.source.name.clone(),
            source_kind: edge.source.kind,
            target: edge.target.name.clone(),
            target_kind: edge.target.kind,
            relation: edge.relation,
        }
    }
}
