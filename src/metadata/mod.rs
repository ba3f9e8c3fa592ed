//! Metadata store adapter.
//!
//! Loads the input documents and exposes the lookups every other component
//! relies on:
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────────────┐
//! │ table master (CSV)       │   │ procedure metadata (JSON)        │
//! │ table_id ↔ table_name    │   │ id, name, inputs, outputs, flags │
//! └────────────┬─────────────┘   └────────────────┬─────────────────┘
//!              └──────────────┬───────────────────┘
//!                             ▼
//!                     ┌───────────────┐
//!                     │ MetadataStore │  get_table_name / get_table_id /
//!                     └───────────────┘  find_procedure / resolve_table_ref
//! ```
//!
//! This is the only component that raises a fatal error for missing inputs.

mod normalize;
mod records;
mod store;

pub use normalize::{derive_masters, procedure_id, table_id, Masters, ProcedureMasterRecord};
pub use records::{
    read_csv, read_dependencies, read_procedure_metadata, read_sources, read_table_master,
    write_csv, DependencyRecord, ProcedureMetadata, SourceRecord, TableMasterRecord,
};
pub use store::{MetadataStore, TableRef};
