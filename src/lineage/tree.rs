//! Depth-bounded lineage trees for single-table queries.
//!
//! Unlike the resolver, the path builder starts from the authoritative
//! dependency records, so it works for procedures nobody has annotated yet.
//! It walks breadth-first and marks a table when it is first scheduled: a
//! table reachable along several routes is expanded once, at its shortest
//! level, and is never also reported as truncated.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::metadata::{DependencyRecord, MetadataStore};

/// Deepest level scheduled when no bound is given.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// One hop on the route from the root, rendered `T:<table>` or
/// `SP:<procedure>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Table(String),
    Procedure(String),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Table(name) => write!(f, "T:{}", name),
            PathStep::Procedure(name) => write!(f, "SP:{}", name),
        }
    }
}

impl Serialize for PathStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeNode {
    /// No authoritative record names the table as destination.
    Origin { table: String, path: Vec<PathStep> },

    /// A procedure producing `output`, with metadata.
    Procedure {
        procedure: String,
        procedure_id: String,
        inputs: Vec<String>,
        output: String,
        external_sources: bool,
        creates_tables: bool,
        path: Vec<PathStep>,
    },

    /// A procedure producing `output` that has no metadata. Not expanded.
    ProcedureUnresolved {
        procedure: String,
        output: String,
        path: Vec<PathStep>,
    },
}

impl TreeNode {
    pub fn path(&self) -> &[PathStep] {
        match self {
            TreeNode::Origin { path, .. }
            | TreeNode::Procedure { path, .. }
            | TreeNode::ProcedureUnresolved { path, .. } => path,
        }
    }

    /// The table or procedure the node is about.
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Origin { table, .. } => table,
            TreeNode::Procedure { procedure, .. }
            | TreeNode::ProcedureUnresolved { procedure, .. } => procedure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageTree {
    pub root: String,
    pub levels: BTreeMap<usize, Vec<TreeNode>>,
    pub all_origin_tables: BTreeSet<String>,
    pub all_procedures: BTreeSet<String>,
    pub max_depth_reached: usize,
    /// Inputs left unexpanded because they lie beyond the depth bound.
    pub truncated: BTreeSet<String>,
}

impl LineageTree {
    fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            levels: BTreeMap::new(),
            all_origin_tables: BTreeSet::new(),
            all_procedures: BTreeSet::new(),
            max_depth_reached: 0,
            truncated: BTreeSet::new(),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (usize, &TreeNode)> {
        self.levels
            .iter()
            .flat_map(|(&level, nodes)| nodes.iter().map(move |node| (level, node)))
    }

    /// Procedures pulling from external sources, with their level.
    pub fn external_source_procedures(&self) -> Vec<(usize, &TreeNode)> {
        self.nodes()
            .filter(|(_, node)| {
                matches!(
                    node,
                    TreeNode::Procedure {
                        external_sources: true,
                        ..
                    }
                )
            })
            .collect()
    }

    /// Procedures that create tables, with their level.
    pub fn table_creating_procedures(&self) -> Vec<(usize, &TreeNode)> {
        self.nodes()
            .filter(|(_, node)| {
                matches!(
                    node,
                    TreeNode::Procedure {
                        creates_tables: true,
                        ..
                    }
                )
            })
            .collect()
    }
}

fn join_path(path: &[PathStep]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ")
}

impl fmt::Display for LineageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lineage of {}", self.root)?;
        writeln!(f, "  max depth reached: {}", self.max_depth_reached)?;
        writeln!(f, "  procedures: {}", self.all_procedures.len())?;
        writeln!(f, "  origin tables: {}", self.all_origin_tables.len())?;

        for (level, nodes) in &self.levels {
            writeln!(f, "\nLevel {}", level)?;
            for node in nodes {
                match node {
                    TreeNode::Origin { table, path } => {
                        writeln!(f, "  ORIGIN {}", table)?;
                        writeln!(f, "    path: {}", join_path(path))?;
                    }
                    TreeNode::Procedure {
                        procedure,
                        procedure_id,
                        inputs,
                        output,
                        external_sources,
                        creates_tables,
                        path,
                    } => {
                        writeln!(f, "  PROCEDURE {} ({}) -> {}", procedure, procedure_id, output)?;
                        writeln!(f, "    inputs: {}", inputs.join(", "))?;
                        writeln!(
                            f,
                            "    external sources: {}, creates tables: {}",
                            external_sources, creates_tables
                        )?;
                        writeln!(f, "    path: {}", join_path(path))?;
                    }
                    TreeNode::ProcedureUnresolved { procedure, output, .. } => {
                        writeln!(f, "  UNRESOLVED {} -> {}", procedure, output)?;
                    }
                }
            }
        }

        if !self.truncated.is_empty() {
            let truncated: Vec<&str> = self.truncated.iter().map(String::as_str).collect();
            writeln!(f, "\nTruncated: {}", truncated.join(", "))?;
        }
        Ok(())
    }
}

/// Builds [`LineageTree`]s from authoritative dependencies and metadata.
#[derive(Debug)]
pub struct PathBuilder<'a> {
    store: &'a MetadataStore,
    producers: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> PathBuilder<'a> {
    pub fn new(store: &'a MetadataStore, dependencies: &'a [DependencyRecord]) -> Self {
        let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in dependencies.iter().filter(|d| d.is_complete()) {
            let procedures = producers.entry(dep.table_name.as_str()).or_default();
            if !procedures.contains(&dep.procedure_name.as_str()) {
                procedures.push(dep.procedure_name.as_str());
            }
        }
        Self { store, producers }
    }

    /// Walk upstream from `root`, scheduling nothing deeper than `max_depth`.
    pub fn build_tree(&self, root: &str, max_depth: usize) -> LineageTree {
        let mut tree = LineageTree::new(root);
        // Tables queued or already expanded; each is expanded once, at the
        // level it was first reached.
        let mut scheduled: HashSet<String> = HashSet::from([root.to_string()]);
        let mut queue = VecDeque::from([(
            root.to_string(),
            0,
            vec![PathStep::Table(root.to_string())],
        )]);

        while let Some((table, level, path)) = queue.pop_front() {
            tree.max_depth_reached = tree.max_depth_reached.max(level);

            let Some(procedures) = self.producers.get(table.as_str()) else {
                tree.all_origin_tables.insert(table.clone());
                tree.levels
                    .entry(level)
                    .or_default()
                    .push(TreeNode::Origin { table, path });
                continue;
            };

            for &procedure in procedures {
                tree.all_procedures.insert(procedure.to_string());
                let mut procedure_path = path.clone();
                procedure_path.push(PathStep::Procedure(procedure.to_string()));

                let Some(meta) = self.store.find_procedure(procedure) else {
                    debug!(procedure, table = %table, "no metadata for procedure");
                    tree.levels
                        .entry(level)
                        .or_default()
                        .push(TreeNode::ProcedureUnresolved {
                            procedure: procedure.to_string(),
                            output: table.clone(),
                            path: procedure_path,
                        });
                    continue;
                };

                let inputs: Vec<String> = meta
                    .inputs
                    .iter()
                    .map(|reference| self.store.resolve_table_ref(reference).name().to_string())
                    .collect();

                for input in &inputs {
                    if scheduled.contains(input) {
                        continue;
                    }
                    if level + 1 > max_depth {
                        tree.truncated.insert(input.clone());
                        continue;
                    }
                    scheduled.insert(input.clone());
                    let mut input_path = procedure_path.clone();
                    input_path.push(PathStep::Table(input.clone()));
                    queue.push_back((input.clone(), level + 1, input_path));
                }

                tree.levels
                    .entry(level)
                    .or_default()
                    .push(TreeNode::Procedure {
                        procedure: procedure.to_string(),
                        procedure_id: meta.procedure_id.clone(),
                        inputs,
                        output: table.clone(),
                        external_sources: meta.external_sources,
                        creates_tables: meta.creates_tables,
                        path: procedure_path,
                    });
            }
        }

        debug!(
            root,
            levels = tree.levels.len(),
            truncated = tree.truncated.len(),
            "built lineage tree"
        );
        tree
    }
}
