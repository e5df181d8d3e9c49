//! # Report Harness CLI (`rpt`)
//!
//! The `rpt` binary drives the property report pipeline: database setup,
//! upload ingestion, querying a persisted index, and the grouped dashboard.
//!
//! ## Usage
//!
//! ```bash
//! rpt --config ./config/rpt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rpt init` | Create the SQLite database and run schema migrations |
//! | `rpt ingest <file>` | Ingest a zip, PDF, or report image |
//! | `rpt query <id> "<question>"` | Ask a question against an upload's index |
//! | `rpt show <id>` | Print the structured record for one upload |
//! | `rpt list` | Dashboard of all records grouped by report type |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use report_harness::dashboard::Dashboard;
use report_harness::embedding::OpenAiEmbedder;
use report_harness::models::{StructuredRecord, UploadIdentity};
use report_harness::oracle::OpenAiOracle;
use report_harness::query::QueryAnswer;
use report_harness::{config, db, pipeline, query, repo};

/// Report Harness CLI — property report ingestion, semantic indexing, and
/// structured extraction.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rpt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rpt",
    about = "Report Harness — property report ingestion, semantic indexing, and structured extraction",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rpt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the records table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Ingest an upload: a zip of PDFs, a single PDF, or a report image.
    ///
    /// Mints a new upload identity, builds its semantic index, extracts the
    /// structured record, and prints the identity for later queries.
    Ingest {
        /// Path to the file to ingest.
        file: PathBuf,
    },

    /// Ask a question against a previously ingested upload.
    Query {
        /// Upload identity printed by `rpt ingest`.
        upload_id: String,

        /// The question to answer from the upload's documents.
        question: String,

        /// Decode the answer into the property schema instead of prose.
        #[arg(long)]
        structured: bool,
    },

    /// Print the structured record for one upload.
    Show {
        /// Upload identity printed by `rpt ingest`.
        upload_id: String,
    },

    /// Dashboard of all records grouped by report type.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file } => {
            let pool = db::connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            let oracle = OpenAiOracle::new(&cfg.oracle)?;
            let embedder = OpenAiEmbedder::new(&cfg.embedding)?;

            let report = pipeline::ingest(&cfg, &oracle, &embedder, &pool, &file).await?;

            println!("ingest {}", file.display());
            println!("  upload id: {}", report.upload_id);
            println!("  documents: {}", report.documents);
            println!("  chunks indexed: {}", report.chunks);
            if let Some(report_type) = &report.report_type {
                println!("  report type: {}", report_type);
            }
            println!("  index: {}", report.index_dir.display());
            println!("ok");
        }
        Commands::Query {
            upload_id,
            question,
            structured,
        } => {
            let id = parse_identity(&upload_id)?;
            let oracle = OpenAiOracle::new(&cfg.oracle)?;
            let embedder = OpenAiEmbedder::new(&cfg.embedding)?;

            let answer = query::answer(&cfg, &oracle, &embedder, &id, &question, structured).await?;
            match answer {
                QueryAnswer::Text(text) => println!("{}", text),
                QueryAnswer::Structured(fields) => {
                    for (name, value) in fields.iter() {
                        if let Some(value) = value {
                            println!("{}: {}", name, value);
                        }
                    }
                }
            }
        }
        Commands::Show { upload_id } => {
            let id = parse_identity(&upload_id)?;
            let pool = db::connect(&cfg).await?;
            let record = repo::find(&pool, &id)
                .await?
                .with_context(|| format!("no record for upload {}", id))?;
            print_record(&record);
        }
        Commands::List => {
            let pool = db::connect(&cfg).await?;
            let records = repo::list_all(&pool).await?;
            let dash = Dashboard::from_records(&records);

            for (bucket, entries) in &dash.buckets {
                println!("{}", bucket);
                for entry in entries {
                    println!("  {}  {}", entry.upload_id, entry.source_file);
                }
            }
            println!();
            println!("records: {}", dash.total_records);
            println!("report types: {}", dash.report_type_count);
            println!("unique fields: {}", dash.unique_field_count);
        }
    }

    Ok(())
}

fn parse_identity(raw: &str) -> anyhow::Result<UploadIdentity> {
    UploadIdentity::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a valid upload identity", raw))
}

fn print_record(record: &StructuredRecord) {
    println!("upload: {}", record.upload_id);
    println!("  source: {}", record.source_file);
    println!("  index: {}", record.index_dir);
    if let Some(report_type) = &record.report_type {
        println!("  report type: {}", report_type);
    }
    for (name, value) in record.fields.iter() {
        if let Some(value) = value {
            println!("  {}: {}", name, value);
        }
    }
}
