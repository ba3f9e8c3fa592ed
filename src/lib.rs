//! # Tributary
//!
//! Table-level lineage for stored-procedure pipelines.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ authoritative dependencies   │   │ table master + procedure     │
//! │ + procedure source text      │   │ metadata (inputs / outputs)  │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!                │                                  │
//!                ▼ [graph]                          ▼ [metadata]
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ LineageGraph                 │   │ MetadataStore                │
//! │ USES / READS / WRITES edges  │   │ id ↔ name, procedure lookup  │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!                                         │                   │
//!                          ┌──────────────┘                   ▼ [lineage]
//!                          ▼ [lineage]          ┌──────────────────────────────┐
//!          ┌──────────────────────────────┐     │ PathBuilder                  │
//!          │ TraceabilityResolver         │     │ depth-bounded BFS tree for   │
//!          │ origin tables + depth for    │     │ one table (uses dependencies)│
//!          │ every produced table         │     └──────────────────────────────┘
//!          └──────────────────────────────┘
//!                          │
//!                          ▼ [index]
//!          ┌──────────────────────────────┐
//!          │ LineageIndex                 │
//!          │ JSON document + SQLite cache │
//!          └──────────────────────────────┘
//! ```
//!
//! [`pipeline::Pipeline`] wires these together from a [`config::Settings`].

pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod lineage;
pub mod metadata;
pub mod pipeline;

pub use error::{Diagnostic, InputKind, LineageError, LineageResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{Diagnostic, LineageError, LineageResult};
    pub use crate::graph::{DependencyEdge, GraphAssembler, LineageGraph, Relation, SourceDialect};
    pub use crate::index::{IndexStore, JsonIndexStore, LineageIndex, SqliteIndexStore};
    pub use crate::lineage::{
        compact_branches, IndexStats, LineageTree, PathBuilder, TraceabilityRecord,
        TraceabilityResolver, TreeNode,
    };
    pub use crate::metadata::{DependencyRecord, MetadataStore, ProcedureMetadata, SourceRecord};
    pub use crate::pipeline::Pipeline;
}
