//! TOML-based configuration for tributary.
//!
//! Supports a config file (tributary.toml) with environment variable expansion.
//! Relative paths are resolved against the directory holding the config file.
//!
//! Example configuration:
//! ```toml
//! [inputs]
//! dependencies = "${LINEAGE_DATA}/01_raw/dependencies.csv"
//! sources = "${LINEAGE_DATA}/01_raw/procedure_sources.csv"
//! metadata = "${LINEAGE_DATA}/03_knowledge/procedure_metadata.json"
//! tables = "${LINEAGE_DATA}/02_processed/table_master.csv"
//!
//! [outputs]
//! index = "data/04_gold/traceability_index.json"
//! edges = "data/02_processed/lineage_edges.csv"
//!
//! [parsing]
//! dialect = "mssql"
//! temporary_patterns = ["XTMP", "^#"]
//!
//! [tree]
//! max_depth = 10
//!
//! [cache]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InputKind, LineageError, LineageResult};
use crate::graph::{SourceDialect, TemporaryTableClassifier, DEFAULT_TEMPORARY_PATTERNS};
use crate::lineage::DEFAULT_MAX_DEPTH;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid temporary table pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Locations of the input documents.
    pub inputs: InputSettings,

    /// Locations of the produced documents.
    pub outputs: OutputSettings,

    /// Source-code parsing options.
    pub parsing: ParsingSettings,

    /// Interactive tree options.
    pub tree: TreeSettings,

    /// Index cache options.
    pub cache: CacheSettings,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// Input document locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputSettings {
    pub dependencies: String,
    pub sources: String,
    pub metadata: String,
    pub tables: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            dependencies: "data/01_raw/dependencies.csv".to_string(),
            sources: "data/01_raw/procedure_sources.csv".to_string(),
            metadata: "data/03_knowledge/procedure_metadata.json".to_string(),
            tables: "data/02_processed/table_master.csv".to_string(),
        }
    }
}

/// Output document locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    /// The persisted traceability index (JSON).
    pub index: String,

    /// Edge list export of the assembled graph (CSV).
    pub edges: String,

    /// Directory for normalized table/procedure masters.
    pub masters_dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            index: "data/04_gold/traceability_index.json".to_string(),
            edges: "data/02_processed/lineage_edges.csv".to_string(),
            masters_dir: "data/02_processed".to_string(),
        }
    }
}

/// Source-code parsing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParsingSettings {
    /// SQL dialect of the procedure sources.
    pub dialect: SourceDialect,

    /// Regex patterns marking a table name as temporary.
    pub temporary_patterns: Vec<String>,
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self {
            dialect: SourceDialect::default(),
            temporary_patterns: DEFAULT_TEMPORARY_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Interactive tree settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Deepest level the path builder schedules.
    pub max_depth: usize,

    /// Maximum number of compact branches rendered per table.
    pub branch_limit: usize,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            branch_limit: 20,
        }
    }
}

/// Index cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Keep a fingerprinted SQLite copy of the index.
    pub enabled: bool,

    /// Cache database path. Defaults to `~/.tributary/index.db`.
    pub path: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Resolved, absolute-or-cwd-relative input paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub dependencies: PathBuf,
    pub sources: PathBuf,
    pub metadata: PathBuf,
    pub tables: PathBuf,
}

impl InputPaths {
    /// Path of one input document.
    pub fn path(&self, kind: InputKind) -> &Path {
        match kind {
            InputKind::Dependencies => &self.dependencies,
            InputKind::Sources => &self.sources,
            InputKind::Metadata => &self.metadata,
            InputKind::TableMaster => &self.tables,
        }
    }

    /// Check that every required input exists.
    ///
    /// Fails on the first missing document, naming it.
    pub fn require(&self, kinds: &[InputKind]) -> LineageResult<()> {
        for &kind in kinds {
            let path = self.path(kind);
            if !path.is_file() {
                return Err(LineageError::MissingInputFile {
                    kind,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TRIBUTARY_CONFIG`
    /// 2. `./tributary.toml`
    /// 3. `~/.config/tributary/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TRIBUTARY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tributary.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tributary").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Set the directory relative paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.tree.branch_limit == 0 {
            return Err(SettingsError::InvalidConfig(
                "tree.branch_limit must be at least 1".to_string(),
            ));
        }
        self.temporary_classifier()?;
        Ok(())
    }

    /// Expand environment variables and anchor relative paths.
    pub fn resolve_path(&self, raw: &str) -> Result<PathBuf, SettingsError> {
        let expanded = PathBuf::from(expand_env_vars(raw)?);
        match &self.base_dir {
            Some(base) if expanded.is_relative() => Ok(base.join(expanded)),
            _ => Ok(expanded),
        }
    }

    /// Resolve all input document paths.
    pub fn input_paths(&self) -> Result<InputPaths, SettingsError> {
        Ok(InputPaths {
            dependencies: self.resolve_path(&self.inputs.dependencies)?,
            sources: self.resolve_path(&self.inputs.sources)?,
            metadata: self.resolve_path(&self.inputs.metadata)?,
            tables: self.resolve_path(&self.inputs.tables)?,
        })
    }

    /// Path of the persisted JSON index.
    pub fn index_path(&self) -> Result<PathBuf, SettingsError> {
        self.resolve_path(&self.outputs.index)
    }

    /// Path of the edge list export.
    pub fn edges_path(&self) -> Result<PathBuf, SettingsError> {
        self.resolve_path(&self.outputs.edges)
    }

    /// Directory for normalized masters.
    pub fn masters_dir(&self) -> Result<PathBuf, SettingsError> {
        self.resolve_path(&self.outputs.masters_dir)
    }

    /// Path of the SQLite index cache, or `None` when caching is disabled.
    pub fn cache_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        if !self.cache.enabled {
            return Ok(None);
        }
        match &self.cache.path {
            Some(path) => self.resolve_path(path).map(Some),
            None => Ok(dirs::home_dir().map(|home| home.join(".tributary").join("index.db"))),
        }
    }

    /// Build the temporary-table classifier from the configured patterns.
    pub fn temporary_classifier(&self) -> Result<TemporaryTableClassifier, SettingsError> {
        TemporaryTableClassifier::new(&self.parsing.temporary_patterns)
            .map_err(|(pattern, source)| SettingsError::InvalidPattern { pattern, source })
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    var_name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
