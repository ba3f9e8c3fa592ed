//! Traceability resolution and interactive lineage queries.
//!
//! Two independent views of the same data:
//!
//! - [`TraceabilityResolver`]: exhaustive and memoized. For every produced
//!   table, all origin tables, every generating procedure and the maximum
//!   path depth. Built from procedure metadata only.
//! - [`PathBuilder`]: a depth-bounded breadth-first walk for one table, built
//!   from authoritative dependencies so unannotated procedures still show up.

mod branches;
mod record;
mod resolver;
mod stats;
mod tree;

pub use branches::compact_branches;
pub use record::{GeneratingProcedure, ResolvedInput, TraceabilityRecord};
pub use resolver::TraceabilityResolver;
pub use stats::IndexStats;
pub use tree::{LineageTree, PathBuilder, PathStep, TreeNode, DEFAULT_MAX_DEPTH};
