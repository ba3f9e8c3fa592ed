//! Table reference extraction from procedure source text.
//!
//! Sources are parsed with sqlparser and walked with its AST visitor. The
//! visitor keeps a stack of open constructs (statements and queries); the
//! innermost one decides the direction of every table reference beneath it.
//!
//! Procedure definitions are cut into statements first (see `split`), so one
//! statement the parser rejects does not hide the rest of the body.

use std::collections::HashSet;
use std::iter;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    FromTable, ObjectName, Query, SetExpr, Statement, TableFactor, TableWithJoins, Visit, Visitor,
};
use sqlparser::dialect::{
    Dialect, DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SnowflakeDialect,
};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError};
use tracing::debug;

use super::classify::{classify_reference, Construct};
use super::split::{split_on_semicolons, split_on_statement_words, strip_procedure_header};
use super::Relation;

/// T-SQL batch separator: `GO` alone on its line.
static BATCH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*GO\s*;?\s*$").unwrap());

/// SQL dialect of the procedure sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDialect {
    #[default]
    #[serde(alias = "tsql")]
    Mssql,
    Postgres,
    Mysql,
    Snowflake,
    Duckdb,
    Generic,
}

impl SourceDialect {
    fn parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            SourceDialect::Mssql => Box::new(MsSqlDialect {}),
            SourceDialect::Postgres => Box::new(PostgreSqlDialect {}),
            SourceDialect::Mysql => Box::new(MySqlDialect {}),
            SourceDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SourceDialect::Duckdb => Box::new(DuckDbDialect {}),
            SourceDialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("SQL parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("SQL tokenize error: {0}")]
    Tokenize(#[from] TokenizerError),
}

/// A directed reference to a table found in source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableReference {
    pub table: String,
    /// `Reads` (table feeds the procedure) or `Writes` (procedure fills it).
    pub access: Relation,
}

impl TableReference {
    pub fn reads(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            access: Relation::Reads,
        }
    }

    pub fn writes(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            access: Relation::Writes,
        }
    }
}

/// Extract every directed table reference from `sql`, in order of first
/// appearance and without duplicates.
///
/// `sql` may be a whole procedure definition. Its `CREATE PROCEDURE ... AS`
/// header and `BEGIN`/`END` words are dropped, and every statement is parsed
/// on its own. Statements the parser rejects are skipped; extraction fails
/// only when none parses.
///
/// Tables that are only deleted, dropped or truncated are left out, as are
/// CTE names. Schema and database qualifiers are dropped.
pub fn extract_table_references(
    sql: &str,
    dialect: SourceDialect,
) -> Result<Vec<TableReference>, ExtractError> {
    let parser_dialect = dialect.parser_dialect();
    let mut collector = ReferenceCollector::default();
    let mut parsed = 0usize;
    let mut first_error: Option<ExtractError> = None;

    for batch in BATCH_SEPARATOR.split(sql) {
        let tokens = match Tokenizer::new(&*parser_dialect, batch).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => {
                first_error.get_or_insert(err.into());
                continue;
            }
        };

        for chunk in split_on_semicolons(strip_procedure_header(&tokens)) {
            let err = match parse_statements(&*parser_dialect, chunk) {
                Ok(statements) => {
                    collector.visit_all(&statements);
                    parsed += 1;
                    continue;
                }
                Err(err) => err,
            };
            debug!(error = %err, "statement run did not parse; splitting on statement words");
            first_error.get_or_insert(err.into());

            for piece in split_on_statement_words(chunk) {
                match parse_statements(&*parser_dialect, piece) {
                    Ok(statements) => {
                        collector.visit_all(&statements);
                        parsed += 1;
                    }
                    Err(err) => debug!(error = %err, "skipping unparsable statement"),
                }
            }
        }
    }

    match first_error {
        Some(err) if parsed == 0 => Err(err),
        _ => Ok(collector.references),
    }
}

fn parse_statements(
    dialect: &dyn Dialect,
    tokens: &[Token],
) -> Result<Vec<Statement>, ParserError> {
    Parser::new(dialect)
        .with_tokens(tokens.to_vec())
        .parse_statements()
}

/// Unqualified table name of an object reference.
fn unqualified(name: &ObjectName) -> Option<String> {
    name.0.last().map(|ident| ident.value.clone())
}

/// The table a DML statement changes.
#[derive(Debug)]
struct Target {
    table: String,
    /// The name written in the statement, when it is an alias of `table`.
    alias: Option<String>,
}

/// Resolve the table named in an `UPDATE` or `DELETE` clause. T-SQL lets the
/// clause name an alias declared in the statement's FROM list:
/// `UPDATE t SET ... FROM od_sales t JOIN ...`.
fn resolve_target<'a>(
    name: &ObjectName,
    sources: impl IntoIterator<Item = &'a TableWithJoins>,
) -> Option<Target> {
    let written = unqualified(name)?;
    if name.0.len() == 1 {
        let factors = sources.into_iter().flat_map(|source| {
            iter::once(&source.relation).chain(source.joins.iter().map(|join| &join.relation))
        });
        for factor in factors {
            if let TableFactor::Table {
                name: aliased,
                alias: Some(alias),
                ..
            } = factor
            {
                if alias.name.value.eq_ignore_ascii_case(&written) {
                    return Some(Target {
                        table: unqualified(aliased)?,
                        alias: Some(written),
                    });
                }
            }
        }
    }
    Some(Target {
        table: written,
        alias: None,
    })
}

fn plain_target(name: &ObjectName) -> Option<Target> {
    resolve_target(name, iter::empty())
}

fn factor_target(factor: &TableFactor) -> Option<Target> {
    match factor {
        TableFactor::Table { name, .. } => plain_target(name),
        _ => None,
    }
}

#[derive(Debug)]
struct Frame {
    construct: Construct,
    targets: Vec<String>,
    /// Aliases standing for a target in this construct.
    aliases: Vec<String>,
    ctes: Vec<String>,
}

#[derive(Debug, Default)]
struct ReferenceCollector {
    frames: Vec<Frame>,
    references: Vec<TableReference>,
    seen: HashSet<TableReference>,
}

impl ReferenceCollector {
    fn visit_all(&mut self, statements: &[Statement]) {
        for statement in statements {
            // The collector never breaks.
            let _ = statement.visit(self);
        }
    }

    fn record(&mut self, table: String, access: Relation) {
        let reference = TableReference { table, access };
        if self.seen.insert(reference.clone()) {
            self.references.push(reference);
        }
    }

    fn open(&mut self, construct: Construct, targets: Vec<Target>, ctes: Vec<String>) {
        let mut frame = Frame {
            construct,
            targets: Vec::with_capacity(targets.len()),
            aliases: Vec::new(),
            ctes,
        };
        for target in targets {
            if let Some(access) = classify_reference(construct, true) {
                self.record(target.table.clone(), access);
            }
            frame.aliases.extend(target.alias);
            frame.targets.push(target.table);
        }
        self.frames.push(frame);
    }

    fn is_cte(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.ctes.iter().any(|cte| cte.eq_ignore_ascii_case(name)))
    }
}

impl Visitor for ReferenceCollector {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<()> {
        let (construct, targets): (Construct, Vec<Target>) = match statement {
            Statement::Insert(insert) => (
                Construct::Insert,
                plain_target(&insert.table_name).into_iter().collect(),
            ),
            Statement::Update { table, from, .. } => {
                let target = match &table.relation {
                    TableFactor::Table { name, .. } => resolve_target(name, from),
                    _ => None,
                };
                (Construct::Update, target.into_iter().collect())
            }
            // MERGE inserts into and updates its target.
            Statement::Merge { table, .. } => {
                (Construct::Update, factor_target(table).into_iter().collect())
            }
            Statement::Delete(delete) => {
                let sources = match &delete.from {
                    FromTable::WithFromKeyword(sources) | FromTable::WithoutKeyword(sources) => {
                        sources
                    }
                };
                let targets = if delete.tables.is_empty() {
                    sources
                        .first()
                        .and_then(|source| factor_target(&source.relation))
                        .into_iter()
                        .collect()
                } else {
                    delete
                        .tables
                        .iter()
                        .filter_map(|name| resolve_target(name, sources))
                        .collect()
                };
                (Construct::Delete, targets)
            }
            Statement::CreateTable(create) => (
                Construct::Create,
                plain_target(&create.name).into_iter().collect(),
            ),
            Statement::CreateView { name, .. } => {
                (Construct::Create, plain_target(name).into_iter().collect())
            }
            _ => (Construct::Other, Vec::new()),
        };
        self.open(construct, targets, Vec::new());
        ControlFlow::Continue(())
    }

    fn post_visit_statement(&mut self, _statement: &Statement) -> ControlFlow<()> {
        self.frames.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        let ctes = query
            .with
            .as_ref()
            .map(|with| {
                with.cte_tables
                    .iter()
                    .map(|cte| cte.alias.name.value.clone())
                    .collect()
            })
            .unwrap_or_default();
        let targets = match query.body.as_ref() {
            SetExpr::Select(select) => select
                .into
                .as_ref()
                .and_then(|into| plain_target(&into.name))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };
        self.open(Construct::Query, targets, ctes);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<()> {
        self.frames.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        let Some(table) = unqualified(relation) else {
            return ControlFlow::Continue(());
        };
        if self.is_cte(&table) {
            return ControlFlow::Continue(());
        }
        let Some(frame) = self.frames.last() else {
            return ControlFlow::Continue(());
        };
        // Targets were handled when their construct opened.
        if frame.targets.contains(&table) || frame.aliases.contains(&table) {
            return ControlFlow::Continue(());
        }
        if let Some(access) = classify_reference(frame.construct, false) {
            self.record(table, access);
        }
        ControlFlow::Continue(())
    }
}
