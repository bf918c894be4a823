//! hostanon - Deterministic anonymization of host-inventory documents.

mod batch;
mod config;
mod document;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use hostanon_common::SchemaVersion;
use hostanon_pseudonym::{hash_only, substitute, substitute_tokens, CorpusKind, PathTable};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hostanon")]
#[command(
    author,
    version,
    about = "Pseudonymize host-inventory JSON documents with stable substitutes"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the corpus files, overriding the config
    #[arg(long, global = true)]
    corpus_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anonymize one document
    Anonymize {
        /// Input document (stdin when omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Output document (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Schema version, instead of detecting it from the document
        #[arg(long)]
        schema_version: Option<SchemaVersion>,

        /// Custom path table (YAML)
        #[arg(long)]
        table: Option<PathBuf>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Anonymize every JSON document of a directory
    Batch {
        /// Input directory
        #[arg(long)]
        input_dir: PathBuf,

        /// Output directory
        #[arg(long, short)]
        out: PathBuf,

        /// Documents processed concurrently
        #[arg(long, default_value = "4")]
        jobs: usize,

        /// Write the batch report (JSON) to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Schema version, instead of detecting it per document
        #[arg(long)]
        schema_version: Option<SchemaVersion>,

        /// Custom path table (YAML)
        #[arg(long)]
        table: Option<PathBuf>,

        /// Pretty-print the output documents
        #[arg(long)]
        pretty: bool,
    },

    /// Show the loaded corpora with their sizes and checksums
    Corpus,

    /// Print the built-in path table of a schema version as YAML
    Table {
        /// Schema version (v0, v1)
        #[arg(long)]
        schema_version: SchemaVersion,
    },

    /// Compute the substitute of a single value
    Substitute {
        /// Value to substitute
        value: String,

        /// Corpus (host, cluster, database, owner, path)
        #[arg(long, default_value = "host")]
        corpus: CorpusKind,

        /// Treat the value as a space-separated list
        #[arg(long)]
        tokens: bool,

        /// Output the fingerprint only
        #[arg(long, conflicts_with = "tokens")]
        hash_only: bool,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // stdout carries documents
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.corpus_dir {
        config.corpus_dir = dir;
    }

    match cli.command {
        Commands::Anonymize {
            input,
            output,
            schema_version,
            table,
            pretty,
        } => {
            let corpora = config.load_corpora()?;
            let tables = config.table_set(&corpora, table.as_deref(), schema_version)?;

            let text = match &input {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };

            let policy = document::VersionPolicy {
                forced: schema_version,
                fallback: config.schema_version,
            };
            let out = document::anonymize_text(&tables, &text, policy, pretty)?;
            info!(
                "Anonymized {} document: {} substituted, {} kept, {} skipped",
                out.version,
                out.stats.substituted,
                out.stats.exempted,
                out.stats.total_skipped()
            );

            match &output {
                Some(path) => {
                    std::fs::write(path, &out.text)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Document written to {:?}", path);
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(out.text.as_bytes())?;
                    stdout.flush()?;
                }
            }
        }

        Commands::Batch {
            input_dir,
            out,
            jobs,
            report,
            schema_version,
            table,
            pretty,
        } => {
            let corpora = config.load_corpora()?;
            let tables = config.table_set(&corpora, table.as_deref(), schema_version)?;

            let options = batch::BatchOptions {
                input_dir,
                output_dir: out,
                jobs,
                version: document::VersionPolicy {
                    forced: schema_version,
                    fallback: config.schema_version,
                },
                pretty,
            };
            let batch_report = batch::run_batch(Arc::new(tables), options).await?;
            let report_json = serde_json::to_string_pretty(&batch_report)?;

            match &report {
                Some(path) => {
                    std::fs::write(path, report_json)?;
                    info!("Report written to {:?}", path);
                }
                None => println!("{}", report_json),
            }

            if batch_report.failed > 0 {
                anyhow::bail!("{} documents failed", batch_report.failed);
            }
        }

        Commands::Corpus => {
            let corpora = config.load_corpora()?;
            for (kind, path) in config.corpus_files() {
                if let Some(corpus) = corpora.get(kind) {
                    println!(
                        "{:<9} {:>5}  {}  {}",
                        kind,
                        corpus.size(),
                        corpus.checksum(),
                        path.display()
                    );
                }
            }
        }

        Commands::Table { schema_version } => {
            let table = PathTable::builtin(schema_version)?;
            print!("{}", table.to_yaml()?);
        }

        Commands::Substitute {
            value,
            corpus,
            tokens,
            hash_only: only_hash,
        } => {
            let result = if only_hash {
                hash_only(&value)
            } else {
                let corpora = config.load_corpora()?;
                let corpus = corpora
                    .get(corpus)
                    .with_context(|| format!("Corpus '{}' is not loaded", corpus))?;
                if tokens {
                    substitute_tokens(&value, corpus)
                } else {
                    substitute(&value, corpus)
                }
            };
            println!("{}", result);
        }
    }

    Ok(())
}
