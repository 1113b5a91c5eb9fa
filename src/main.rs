//! Repograph CLI - build a repository graph and write it to SQLite

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use repograph::config::{self, RepographConfig};
use repograph::storage::{self, GraphStore, SqliteStore};
use repograph::ui::{self, Icons, IndexProgress};
use repograph::{GraphBuilder, LanguageRegistry, LanguageServerPool};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "repograph")]
#[command(version)]
#[command(about = "Repository graph builder - tree-sitter hierarchies linked by language server references")]
#[command(long_about = r#"
Repograph parses a source tree into files, classes, functions, methods and
variables, then asks one language server per language where each definition
is used. The result is a graph of CONTAINS, CALLS, IMPORTS, INHERITS, TYPES,
ASSIGNS and REFERENCES edges stored in SQLite.

Example usage:
  repograph index --path ./my-project
  repograph index --path . --no-references
  repograph stats
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory into the graph database
    Index {
        /// Directory to index (default: config `path`, then the current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Database file (default: <path>/.repograph/repograph.db)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Config file (default: ./repograph.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only extract the containment hierarchy; start no language servers
        #[arg(long)]
        no_references: bool,

        /// Also write the records, stats and skipped files as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List supported languages, their extensions and server commands
    Languages {
        /// Config file (default: ./repograph.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show statistics about a graph database
    Stats {
        /// Database file (default: ./.repograph/repograph.db)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Index {
            path,
            database,
            config,
            no_references,
            json,
        } => {
            let config = config::load_config(config.as_deref())?;
            run_index(config, path, database, no_references, json)
        }

        Commands::Languages { config } => {
            let config = config::load_config(config.as_deref())?;
            let registry = LanguageRegistry::with_defaults();
            ui::section("Languages");
            println!(
                "{}",
                ui::languages_table(&registry, |language| {
                    config.server_command(language).map(|command| command.join(" "))
                })
            );
            Ok(())
        }

        Commands::Stats { database } => {
            let database =
                database.unwrap_or_else(|| config::default_database_path_in(Path::new(".")));
            if !database.exists() {
                ui::warn(&format!("No database at {}", database.display()));
                return Ok(());
            }
            let store = SqliteStore::open(&database)?;
            let stats = store.stats()?;
            ui::status(Icons::DATABASE, "Database", &database.display().to_string());
            ui::section("Graph");
            println!("{}", ui::store_stats_table(&stats));
            Ok(())
        }
    }
}

fn run_index(
    config: RepographConfig,
    path: Option<PathBuf>,
    database: Option<PathBuf>,
    no_references: bool,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = path
        .or_else(|| config.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let root = std::path::absolute(&root)?;
    anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

    let database = database
        .or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config::default_database_path_in(&root));

    ui::header(&format!("Indexing {}", root.display()));
    ui::status(Icons::DATABASE, "Database", &database.display().to_string());
    tracing::info!("Indexing {} into {:?}", root.display(), database);

    let started = Instant::now();
    let registry = Arc::new(LanguageRegistry::with_defaults());
    let (progress, tx) = IndexProgress::new();
    let builder = GraphBuilder::new(root.clone(), Arc::clone(&registry), config.clone()).with_progress(tx);

    let result = if no_references {
        builder.build_structure()
    } else {
        let pool = LanguageServerPool::from_config(Arc::clone(&registry), &root, &config);
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(builder.build(&pool))
    };
    // the progress thread exits once the builder's sender is gone
    drop(builder);
    let output = result?;

    let graph = &output.graph;
    let stats = graph.stats();
    progress.finish_with_summary(
        started.elapsed(),
        stats.files,
        stats.total_nodes(),
        stats.total_relationships(),
        stats.external_relationships,
    );

    for skipped in &output.skipped {
        ui::warn(&format!("Skipped {}: {}", skipped.path.display(), skipped.reason));
    }

    config::ensure_db_dir(&database)?;
    let mut store = SqliteStore::open(&database)?;
    storage::persist(graph, &mut store)?;
    store.close()?;

    if let Some(json_path) = json {
        config::ensure_db_dir(&json_path)?;
        let file = std::fs::File::create(&json_path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &output.report())?;
        ui::status(Icons::FILE, "Report", &json_path.display().to_string());
    }

    ui::section("Graph");
    println!("{}", ui::stats_table(&stats));
    ui::success(&format!("Saved to {}", database.display()));
    Ok(())
}
