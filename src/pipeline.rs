//! End-to-end operations over configured inputs.
//!
//! ```text
//! dependencies ──┬──────────────► GraphAssembler ──► edge CSV
//! sources ───────┘
//! table master ──┬─► MetadataStore ─► TraceabilityResolver ─► LineageIndex ─► JSON + SQLite cache
//! metadata ──────┘         │
//! dependencies ────────────┴──────► PathBuilder ─► LineageTree
//! ```
//!
//! Input existence is checked once per operation, before anything is read.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{InputPaths, Settings};
use crate::error::{Diagnostic, InputKind, LineageResult};
use crate::graph::{Assembly, GraphAssembler};
use crate::index::{
    compute_hash, IndexEntry, IndexError, IndexStore, JsonIndexStore, LineageIndex,
    SqliteIndexStore,
};
use crate::lineage::{LineageTree, PathBuilder, TraceabilityResolver};
use crate::metadata::{
    derive_masters, read_dependencies, read_procedure_metadata, read_sources, read_table_master,
    write_csv, DependencyRecord, Masters, MetadataStore, ProcedureMetadata, SourceRecord,
    TableMasterRecord,
};

/// Bump to invalidate every stored index when resolution semantics change.
const INDEX_FORMAT: u32 = 1;

#[derive(Serialize)]
struct FingerprintInput<'a> {
    format: u32,
    tables: &'a [TableMasterRecord],
    metadata: &'a [ProcedureMetadata],
}

/// Metadata store plus the fingerprint of the documents it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedMetadata {
    pub store: MetadataStore,
    pub fingerprint: String,
}

/// Outcome of [`Pipeline::build_index`].
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub index: LineageIndex,
    /// Unknown references and cycle breaks. A reused index reports unknown
    /// references only; its cycles show in `cyclic_tables`.
    pub diagnostics: Vec<Diagnostic>,
    pub cyclic_tables: Vec<String>,
    pub from_cache: bool,
}

/// Written master files.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub masters: Masters,
    pub tables_path: PathBuf,
    pub procedures_path: PathBuf,
}

pub struct Pipeline {
    settings: Settings,
    paths: InputPaths,
}

impl Pipeline {
    pub fn new(settings: Settings) -> LineageResult<Self> {
        let paths = settings.input_paths()?;
        Ok(Self { settings, paths })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn input_paths(&self) -> &InputPaths {
        &self.paths
    }

    pub fn load_metadata(&self) -> LineageResult<LoadedMetadata> {
        self.paths
            .require(&[InputKind::TableMaster, InputKind::Metadata])?;
        let tables = read_table_master(&self.paths.tables)?;
        let metadata = read_procedure_metadata(&self.paths.metadata)?;

        let fingerprint = compute_hash(&FingerprintInput {
            format: INDEX_FORMAT,
            tables: &tables,
            metadata: &metadata,
        })
        .map_err(IndexError::from)?;

        Ok(LoadedMetadata {
            store: MetadataStore::new(tables, metadata),
            fingerprint,
        })
    }

    pub fn load_dependencies(&self) -> LineageResult<Vec<DependencyRecord>> {
        self.paths.require(&[InputKind::Dependencies])?;
        read_dependencies(&self.paths.dependencies)
    }

    /// Procedure sources are optional. Without them the graph holds only
    /// authoritative edges.
    pub fn load_sources(&self) -> LineageResult<Vec<SourceRecord>> {
        if !self.paths.sources.is_file() {
            warn!(
                path = %self.paths.sources.display(),
                "procedure sources not found; assembling from dependencies only"
            );
            return Ok(Vec::new());
        }
        read_sources(&self.paths.sources)
    }

    /// Assemble the lineage graph and export its edges.
    pub fn assemble_graph(&self) -> LineageResult<Assembly> {
        let dependencies = self.load_dependencies()?;
        let sources = self.load_sources()?;

        let assembler = GraphAssembler::new(
            self.settings.parsing.dialect,
            self.settings.temporary_classifier()?,
        );
        let assembly = assembler.assemble(&dependencies, &sources);

        let edges_path = self.settings.edges_path()?;
        assembly.graph.write_edges_csv(&edges_path)?;
        info!(path = %edges_path.display(), edges = assembly.graph.edge_count(), "exported edges");
        Ok(assembly)
    }

    fn open_cache(&self) -> Option<SqliteIndexStore> {
        let path = match self.settings.cache_path() {
            Ok(Some(path)) => path,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "index cache disabled");
                return None;
            }
        };
        match SqliteIndexStore::open(&path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open index cache");
                None
            }
        }
    }

    /// Resolve every produced table and persist the index.
    ///
    /// Unless `force` is set, an index stored under the current input
    /// fingerprint is reused. The JSON document only ever changes by atomic
    /// replacement with a complete index.
    pub fn build_index(&self, force: bool) -> LineageResult<IndexBuild> {
        let loaded = self.load_metadata()?;
        let document = JsonIndexStore::new(self.settings.index_path()?);
        let cache = self.open_cache();

        if !force {
            if let Some(index) = document.load(&loaded.fingerprint)? {
                info!(tables = index.len(), "traceability index is current");
                return Ok(reused(index, &loaded.store));
            }
            let restored = cache
                .as_ref()
                .and_then(|c| cached_load(c, &loaded.fingerprint));
            if let Some(index) = restored {
                info!(tables = index.len(), "restored traceability index from cache");
                document.save(&loaded.fingerprint, &index)?;
                return Ok(reused(index, &loaded.store));
            }
        }

        let mut resolver = TraceabilityResolver::new(&loaded.store);
        let records = resolver.resolve_all();
        let index = LineageIndex::from_records(records, &loaded.store);

        document.save(&loaded.fingerprint, &index)?;
        if let Some(cache) = &cache {
            if let Err(e) = cache.save(&loaded.fingerprint, &index) {
                warn!(error = %e, "could not update index cache");
            }
        }

        Ok(IndexBuild {
            index,
            diagnostics: resolver.diagnostics(),
            cyclic_tables: resolver.cyclic_tables().into_iter().collect(),
            from_cache: false,
        })
    }

    /// Traceability of one table. Tables no procedure produces resolve to
    /// themselves as origin.
    pub fn query(&self, table: &str) -> LineageResult<(IndexEntry, LineageIndex)> {
        let build = self.build_index(false)?;
        let entry = match build.index.get(table) {
            Some(entry) => entry.clone(),
            None => {
                let loaded = self.load_metadata()?;
                let mut resolver = TraceabilityResolver::new(&loaded.store);
                IndexEntry {
                    table_id: loaded.store.get_table_id(table).map(str::to_string),
                    traceability: resolver.resolve(table),
                }
            }
        };
        Ok((entry, build.index))
    }

    /// Build the interactive lineage tree of `root`.
    pub fn build_tree(&self, root: &str, max_depth: Option<usize>) -> LineageResult<LineageTree> {
        let dependencies = self.load_dependencies()?;
        let loaded = self.load_metadata()?;
        if loaded.store.get_table_id(root).is_none() {
            warn!(table = root, "table is not in the table master");
        }
        let max_depth = max_depth.unwrap_or(self.settings.tree.max_depth);
        Ok(PathBuilder::new(&loaded.store, &dependencies).build_tree(root, max_depth))
    }

    /// Derive and write the table and procedure masters.
    pub fn normalize(&self) -> LineageResult<Normalized> {
        let dependencies = self.load_dependencies()?;
        let sources = self.load_sources()?;
        let masters = derive_masters(&dependencies, &sources);

        let dir = self.settings.masters_dir()?;
        let tables_path = dir.join("table_master.csv");
        let procedures_path = dir.join("procedure_master.csv");
        write_csv(&tables_path, &masters.tables)?;
        write_csv(&procedures_path, &masters.procedures)?;
        info!(
            tables = masters.tables.len(),
            procedures = masters.procedures.len(),
            dir = %dir.display(),
            "wrote masters"
        );

        Ok(Normalized {
            masters,
            tables_path,
            procedures_path,
        })
    }
}

/// Wrap a stored index. Unknown references and produce cycles come from the
/// metadata alone, so they are recomputed without resolving anything.
fn reused(index: LineageIndex, store: &MetadataStore) -> IndexBuild {
    let resolver = TraceabilityResolver::new(store);
    IndexBuild {
        index,
        diagnostics: resolver.diagnostics(),
        cyclic_tables: resolver.cyclic_tables().into_iter().collect(),
        from_cache: true,
    }
}

fn cached_load(cache: &SqliteIndexStore, fingerprint: &str) -> Option<LineageIndex> {
    match cache.load(fingerprint) {
        Ok(index) => index,
        Err(e) => {
            warn!(error = %e, "could not read index cache");
            None
        }
    }
}
