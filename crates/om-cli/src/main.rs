//! CLI entry point for objmap.
//!
//! Reads a mapping document (shape declarations, pair configuration and a
//! source graph), maps the graph and prints the target graph as JSON.
//!
//! # Usage
//!
//! ```bash
//! objmap [OPTIONS] <COMMAND>
//!
//! # Map the document's source graph and print the result
//! objmap map order.json
//!
//! # Show the compiled plan tree
//! objmap plan order.json
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod document;
mod graph;
mod types;

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use om_core::MapperConfig;
use serde_json::Value as Json;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::document::{Document, Session};
use crate::graph::{Decoder, Encoder};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Maps object graphs between declared shapes.
#[derive(Parser)]
#[command(name = "objmap", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Mapper configuration file; replaces the document's `config`.
    #[arg(short, long, global = true, env = "OBJMAP_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Map the document's source graph and print the target graph.
    Map {
        /// Mapping document.
        document: Utf8PathBuf,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,

        /// Print single-line JSON.
        #[arg(long)]
        compact: bool,

        /// Print mapper counters to stderr afterwards.
        #[arg(long)]
        stats: bool,
    },

    /// Print the compiled plan tree of the document's root pair.
    Plan {
        /// Mapping document.
        document: Utf8PathBuf,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `warn` level by default so the
/// mapped graph stays the only output.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loads a document, replacing its mapper configuration when `--config` is
/// given.
fn load_document(path: &Utf8Path, config: Option<&Utf8Path>) -> color_eyre::Result<Document> {
    let mut document = Document::from_path(path)?;
    if let Some(config) = config {
        document.config = MapperConfig::from_path(config)?;
        info!(path = %config, "Loaded mapper configuration");
    }
    Ok(document)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Maps the document's graph and returns the target graph as JSON.
fn map_document(document: &Document, session: &Session) -> color_eyre::Result<Json> {
    let schema = session.schema();
    let value = Decoder::new(schema)
        .decode(session.source, &document.value)
        .wrap_err("in `value`")?;

    let mapped = match &document.existing {
        Some(existing) => {
            let mut target = Decoder::new(schema)
                .decode(session.target, existing)
                .wrap_err("in `existing`")?;
            session
                .mapper
                .map_value_into(&value, session.source, session.target, &mut target)?;
            target
        }
        None => session.mapper.map(&value, session.source, session.target)?,
    };

    Encoder::new(schema).encode(session.target, &mapped)
}

/// Runs the `map` command.
fn run_map(
    document: &Document,
    output: Option<&Utf8Path>,
    compact: bool,
    stats: bool,
) -> color_eyre::Result<()> {
    let session = document.compile()?;
    info!(
        pair = %session.schema().pair_label(om_core::TypePair::new(session.source, session.target)),
        "Mapping"
    );
    let json = map_document(document, &session)?;
    let mut content = if compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };
    content.push('\n');

    if let Some(output_path) = output {
        std::fs::write(output_path.as_std_path(), &content)
            .wrap_err_with(|| format!("failed to write {output_path}"))?;
        info!(path = %output_path, "Target graph written");
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{content}")?;
    }

    if stats {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        writeln!(handle, "{}", serde_json::to_string_pretty(&session.mapper.stats())?)?;
    }
    Ok(())
}

/// Runs the `plan` command.
fn run_plan(document: &Document) -> color_eyre::Result<()> {
    let session = document.compile()?;
    let tree = session.mapper.explain(session.source, session.target)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write!(handle, "{tree}")?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Map {
            document,
            output,
            compact,
            stats,
        } => {
            let document = load_document(document, cli.config.as_deref())?;
            run_map(&document, output.as_deref(), *compact, *stats)
        }
        Commands::Plan { document } => {
            let document = load_document(document, cli.config.as_deref())?;
            run_plan(&document)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(json: &str) -> Json {
        let document = Document::from_json_str(json).unwrap();
        let session = document.compile().unwrap();
        map_document(&document, &session).unwrap()
    }

    #[test]
    fn test_flattening_document() {
        let out = run(r#"{
            "shapes": [
                { "kind": "record", "name": "Customer", "members": { "Name": "text" } },
                { "kind": "record", "name": "Order", "members": { "Customer": "Customer", "Qty": "text" } },
                { "kind": "record", "name": "OrderDto", "members": { "CustomerName": "text", "Qty": "i32" } }
            ],
            "pairs": [
                { "source": "Order", "target": "OrderDto", "members": { "CustomerName": "Customer.Name" } }
            ],
            "source": "Order",
            "target": "OrderDto",
            "value": { "Customer": { "Name": "Ada" }, "Qty": "3" }
        }"#);
        assert_eq!(out, json!({ "$id": "1", "CustomerName": "Ada", "Qty": 3 }));
    }

    #[test]
    fn test_cyclic_document_keeps_its_shape() {
        let out = run(r#"{
            "shapes": [
                { "kind": "record", "name": "Node", "members": { "Label": "text", "Next": "Node?" } },
                { "kind": "record", "name": "NodeDto", "members": { "Label": "text", "Next": "NodeDto?" } }
            ],
            "source": "Node",
            "target": "NodeDto",
            "value": { "$id": "a", "Label": "A", "Next": { "Label": "B", "Next": { "$ref": "a" } } }
        }"#);
        insta::assert_snapshot!(
            out.to_string(),
            @r#"{"$id":"1","Label":"A","Next":{"$id":"2","Label":"B","Next":{"$ref":"1"}}}"#
        );
    }

    #[test]
    fn test_update_onto_existing_graph() {
        let out = run(r#"{
            "shapes": [
                { "kind": "record", "name": "Line", "members": { "Sku": "text", "Qty": "i32" } },
                { "kind": "record", "name": "Cart", "members": { "Lines": "list<Line>" } }
            ],
            "pairs": [
                {
                    "source": "list<Line>",
                    "target": "list<Line>",
                    "options": { "collection_behavior": "update", "match_by": "Sku" }
                }
            ],
            "source": "Cart",
            "target": "Cart",
            "value": { "Lines": [{ "Sku": "b", "Qty": 5 }, { "Sku": "c", "Qty": 1 }] },
            "existing": { "Lines": [{ "Sku": "a", "Qty": 1 }, { "Sku": "b", "Qty": 2 }] }
        }"#);
        assert_eq!(
            out,
            json!({
                "$id": "1",
                "Lines": [
                    { "$id": "2", "Sku": "b", "Qty": 5 },
                    { "$id": "3", "Sku": "c", "Qty": 1 }
                ]
            })
        );
    }
}
