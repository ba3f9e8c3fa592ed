//! Pure classification rules: table reference direction and temporary names.

use std::sync::LazyLock;

use regex::Regex;

use super::Relation;

/// Patterns marking a table as transient, unless configured otherwise.
pub const DEFAULT_TEMPORARY_PATTERNS: &[&str] = &["XTMP", "^#"];

static DEFAULT_CLASSIFIER: LazyLock<TemporaryTableClassifier> = LazyLock::new(|| {
    TemporaryTableClassifier {
        patterns: DEFAULT_TEMPORARY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect(),
    }
});

/// The statement construct nearest to a table reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    /// A query body: select, join, subquery or CTE body.
    Query,
    Insert,
    Update,
    /// `CREATE TABLE` or `CREATE VIEW`.
    Create,
    /// The deleted table carries no direction; joined tables are read.
    Delete,
    /// Any other statement (drop, truncate, procedure wrappers...).
    Other,
}

/// Whether a procedure touching a table through this reference reads or
/// writes it.
///
/// Returns `None` when the reference carries no direction.
pub fn classify_reference(construct: Construct, is_target: bool) -> Option<Relation> {
    match (construct, is_target) {
        (Construct::Insert | Construct::Update | Construct::Create, true) => Some(Relation::Writes),
        // SELECT ... INTO
        (Construct::Query, true) => Some(Relation::Writes),
        (Construct::Query, false) => Some(Relation::Reads),
        // UPDATE t SET ... FROM t JOIN s, DELETE t FROM t JOIN s
        (Construct::Insert | Construct::Update | Construct::Delete, false) => {
            Some(Relation::Reads)
        }
        (Construct::Delete, true) | (Construct::Create, false) | (Construct::Other, _) => None,
    }
}

/// Classifies table names as temporary by regex.
#[derive(Debug, Clone)]
pub struct TemporaryTableClassifier {
    patterns: Vec<Regex>,
}

impl TemporaryTableClassifier {
    /// Compile the patterns. On failure returns the offending pattern.
    pub fn new(patterns: &[String]) -> Result<Self, (String, regex::Error)> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| (p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_temporary(&self, table: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(table))
    }
}

impl Default for TemporaryTableClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}
