//! Tributary CLI - table lineage for stored-procedure pipelines
//!
//! Usage:
//!   tributary build [--force]
//!   tributary query <table> [--branches <n>] [--json]
//!   tributary tree <table> [--max-depth <n>] [--json]
//!   tributary graph [--dialect <dialect>]
//!   tributary normalize
//!   tributary stats [--top <n>]
//!
//! Settings come from `--config`, `$TRIBUTARY_CONFIG`, `./tributary.toml` or
//! the user config directory, in that order.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tributary::config::Settings;
use tributary::graph::SourceDialect;
use tributary::index::JsonIndexStore;
use tributary::lineage::{compact_branches, IndexStats};
use tributary::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "Tributary - table-level lineage and traceability for stored procedures")]
#[command(version)]
struct Cli {
    /// Path to a tributary.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every produced table and write the traceability index
    Build {
        /// Ignore any index stored for the current inputs
        #[arg(long)]
        force: bool,
    },

    /// Show the traceability of one table
    Query {
        table: String,

        /// Maximum number of compact branches to print
        #[arg(short, long)]
        branches: Option<usize>,

        /// Print the index entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the depth-bounded lineage tree of one table
    Tree {
        table: String,

        /// Deepest level to expand
        #[arg(short, long)]
        max_depth: Option<usize>,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assemble the lineage graph and export its edge list
    Graph {
        /// SQL dialect of the procedure sources
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Derive table and procedure masters from the dependency records
    Normalize,

    /// Summarize the written traceability index
    Stats {
        /// Number of most complex tables to list
        #[arg(short, long, default_value = "5")]
        top: usize,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Tsql,
    Postgres,
    Mysql,
    Snowflake,
    Duckdb,
    Generic,
}

impl From<DialectArg> for SourceDialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Tsql => SourceDialect::Mssql,
            DialectArg::Postgres => SourceDialect::Postgres,
            DialectArg::Mysql => SourceDialect::Mysql,
            DialectArg::Snowflake => SourceDialect::Snowflake,
            DialectArg::Duckdb => SourceDialect::Duckdb,
            DialectArg::Generic => SourceDialect::Generic,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "tributary=debug"
    } else {
        "tributary=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let mut settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Commands::Graph {
        dialect: Some(dialect),
    } = &cli.command
    {
        settings.parsing.dialect = dialect.clone().into();
    }

    let pipeline = match Pipeline::new(settings) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Build { force } => cmd_build(&pipeline, force),
        Commands::Query {
            table,
            branches,
            json,
        } => cmd_query(&pipeline, &table, branches, json),
        Commands::Tree {
            table,
            max_depth,
            json,
        } => cmd_tree(&pipeline, &table, max_depth, json),
        Commands::Graph { .. } => cmd_graph(&pipeline),
        Commands::Normalize => cmd_normalize(&pipeline),
        Commands::Stats { top } => cmd_stats(&pipeline, top),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_build(pipeline: &Pipeline, force: bool) -> CmdResult {
    let build = pipeline.build_index(force)?;

    println!(
        "Indexed {} tables{}",
        build.index.len(),
        if build.from_cache { " (unchanged inputs)" } else { "" }
    );
    println!("Written to {}", pipeline.settings().index_path()?.display());

    if !build.cyclic_tables.is_empty() {
        println!("\nTables on produce cycles ({}):", build.cyclic_tables.len());
        for table in &build.cyclic_tables {
            println!("  {}", table);
        }
    }
    if !build.diagnostics.is_empty() {
        println!("\nDiagnostics ({}):", build.diagnostics.len());
        for diagnostic in &build.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

fn cmd_query(pipeline: &Pipeline, table: &str, branches: Option<usize>, json: bool) -> CmdResult {
    let (entry, index) = pipeline.query(table)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let record = &entry.traceability;
    println!(
        "Traceability of {} ({})",
        table,
        entry.table_id.as_deref().unwrap_or("no id")
    );
    if record.is_origin {
        println!("  origin table: no procedure produces it");
        return Ok(());
    }

    println!("  depth: {}", record.depth);
    println!("  origin tables ({}):", record.origin_tables.len());
    for origin in &record.origin_tables {
        println!("    {}", origin);
    }
    println!("  generating procedures ({}):", record.generating_procedures.len());
    for generator in &record.generating_procedures {
        let external = if generator.external_sources {
            " [external sources]"
        } else {
            ""
        };
        println!(
            "    {} - {} ({} inputs){}",
            generator.procedure_id,
            generator.procedure_name,
            generator.inputs.len(),
            external
        );
    }

    let limit = branches.unwrap_or(pipeline.settings().tree.branch_limit);
    println!("  branches:");
    for (i, branch) in compact_branches(&index, table, limit).iter().enumerate() {
        println!("    {:2}. {}", i + 1, branch);
    }
    Ok(())
}

fn cmd_tree(pipeline: &Pipeline, table: &str, max_depth: Option<usize>, json: bool) -> CmdResult {
    let tree = pipeline.build_tree(table, max_depth)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    print!("{}", tree);

    let external = tree.external_source_procedures();
    if !external.is_empty() {
        println!("\nProcedures with external sources:");
        for (level, node) in external {
            println!("  {} (level {})", node.name(), level);
        }
    }
    let creating = tree.table_creating_procedures();
    if !creating.is_empty() {
        println!("\nProcedures creating tables:");
        for (level, node) in creating {
            println!("  {} (level {})", node.name(), level);
        }
    }
    Ok(())
}

fn cmd_graph(pipeline: &Pipeline) -> CmdResult {
    let assembly = pipeline.assemble_graph()?;
    let graph = &assembly.graph;

    println!(
        "{} tables, {} procedures, {} edges ({} sources parsed)",
        graph.tables().len(),
        graph.procedures().len(),
        graph.edge_count(),
        assembly.parsed_procedures
    );
    println!("Edges written to {}", pipeline.settings().edges_path()?.display());

    let temporary = graph.temporary_tables();
    if !temporary.is_empty() {
        println!("\nTemporary tables ({}):", temporary.len());
        for table in temporary {
            println!("  {}", table);
        }
    }
    if !assembly.diagnostics.is_empty() {
        println!("\nUnparsable sources ({}):", assembly.diagnostics.len());
        for diagnostic in &assembly.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

fn cmd_normalize(pipeline: &Pipeline) -> CmdResult {
    let normalized = pipeline.normalize()?;
    println!(
        "{} tables -> {}",
        normalized.masters.tables.len(),
        normalized.tables_path.display()
    );
    println!(
        "{} procedures -> {}",
        normalized.masters.procedures.len(),
        normalized.procedures_path.display()
    );
    Ok(())
}

fn cmd_stats(pipeline: &Pipeline, top: usize) -> CmdResult {
    let store = JsonIndexStore::new(pipeline.settings().index_path()?);
    if !store.exists() {
        return Err(format!(
            "no index at {}; run `tributary build` first",
            store.path().display()
        )
        .into());
    }
    let index = store.read()?;
    print!("{}", IndexStats::compute(&index, top));
    Ok(())
}
