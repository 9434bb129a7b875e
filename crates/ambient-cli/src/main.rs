//! Ambient CLI - Command-line interface
//!
//! Offline processing of saved model output and service payloads.
//!
//! Usage:
//!   ambient soap <generated.txt>
//!   ambient fallback <transcript.txt>
//!   ambient extract <response.json> [--text <note.txt>] [--audit]
//!   ambient project <normalize.json> --category <category>
//!   ambient batch <payloads.json> [--format json|tsv]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use ambient_core::{AppConfig, Category, LoggingConfig, NoteSource, SoapNote};
use ambient_extractor::{
    codemap, BatchAggregator, BatchDocument, ExtractionParser, WORKBOOK_COLUMNS,
};
use ambient_soap::{recover_sections, SoapGenerator};

#[derive(Parser)]
#[command(name = "ambient")]
#[command(about = "Ambient clinical note pipeline CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover SOAP sections from saved model output
    Soap {
        /// Generated text file
        path: PathBuf,
    },
    /// Build a rule-based SOAP note from a raw transcript
    Fallback {
        /// Transcript file
        path: PathBuf,
    },
    /// Categorize entities from a saved extraction response
    Extract {
        /// Extraction response JSON
        response: PathBuf,

        /// Text the response's offsets refer to
        #[arg(long)]
        text: Option<PathBuf>,

        /// Also list dropped entities and why
        #[arg(long)]
        audit: bool,
    },
    /// Project standard codes out of a saved normalization response
    Project {
        /// Normalization response JSON
        response: PathBuf,

        /// problem, procedure, medication or lab
        #[arg(long)]
        category: Category,
    },
    /// Flatten a batch of extraction payloads into workbook records
    Batch {
        /// Manifest JSON: file name -> {payload, run_time, ...}
        manifest: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Tsv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    match cli.command {
        Commands::Soap { path } => {
            let text = read_text(&path)?;
            let note = SoapNote::new(recover_sections(&text), NoteSource::Generated, None);
            print_json(&note)?;
        }
        Commands::Fallback { path } => {
            let transcript = read_text(&path)?;
            let note = SoapGenerator::rule_based()
                .with_config(config.llm.clone())
                .generate(&transcript)
                .await?;
            print_json(&note)?;
        }
        Commands::Extract {
            response,
            text,
            audit,
        } => {
            let response = read_json(&response)?;
            let text = match text {
                Some(path) => read_text(&path)?,
                None => String::new(),
            };

            let parser = ExtractionParser::with_config(&config.extraction);
            if audit {
                print_json(&parser.parse_with_audit(&response, &text))?;
            } else {
                print_json(&parser.parse(&response, &text))?;
            }
        }
        Commands::Project { response, category } => {
            let response = read_json(&response)?;
            print_json(&codemap::project(&response, category))?;
        }
        Commands::Batch { manifest, format } => {
            let manifest = read_json(&manifest)?;
            let documents = BatchDocument::from_manifest(&manifest)?;
            let records = BatchAggregator::with_config(&config.batch).aggregate(&documents);
            tracing::info!(
                documents = documents.len(),
                records = records.len(),
                "Writing batch records"
            );

            match format {
                OutputFormat::Json => print_json(&records)?,
                OutputFormat::Tsv => {
                    println!("{}", WORKBOOK_COLUMNS.join("\t"));
                    for record in &records {
                        let row: Vec<String> =
                            record.to_row().iter().map(|cell| tsv_cell(cell)).collect();
                        println!("{}", row.join("\t"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn tsv_cell(cell: &str) -> String {
    cell.replace(['\t', '\r', '\n'], " ")
}
