//! Command-line front end for metatree roots.
//!
//! Commands:
//! - `init` - Open or initialize the root and print its schema
//! - `put <query> <source>` - Copy a local file or directory into a node
//! - `get <path> [--output FILE]` - Copy an artifact to a file or stdout
//! - `ls [query]` - List the entries of a node
//! - `meta [query]` - Print the metadata of a node as JSON
//! - `update <query> key=value...` - Merge fields into the metadata of a node
//!
//! Queries use the path notation (`m1/<active>/train`) or, when they start
//! with `{`, the structured JSON notation.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use metatree::metatree_backend::DocumentFormat;
use metatree::TreeOptions;

mod commands;

pub use commands::execute;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Tree(#[from] metatree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON query: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid field '{field}': expected key=value")]
    InvalidField { field: String },
}

/// Metadata document format offered on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

impl From<Format> for DocumentFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => DocumentFormat::Json,
            Format::Yaml => DocumentFormat::Yaml,
        }
    }
}

/// metatree - schema-validated tree database
#[derive(Parser, Debug)]
#[command(name = "metatree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root URL or local path of the tree
    #[arg(long, env = "METATREE_ROOT")]
    pub root: String,

    /// Key schema used when the root is initialized
    #[arg(long, value_delimiter = ',')]
    pub keys: Vec<String>,

    /// Enable the root lock when the root is initialized
    #[arg(long)]
    pub locking: bool,

    /// Metadata document format used when the root is initialized
    #[arg(long, value_enum)]
    pub metadata_format: Option<Format>,

    /// Log debug output (-v) or everything (-vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open or initialize the root and print its schema
    Init,
    /// Copy a local file or directory into the node a query designates
    Put { query: String, source: PathBuf },
    /// Copy an artifact to a file, or to stdout without --output
    Get {
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the entries of a node
    Ls { query: Option<String> },
    /// Print the metadata of a node as JSON
    Meta { query: Option<String> },
    /// Merge key=value fields into the metadata of a node
    Update {
        query: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

impl Cli {
    pub fn options(&self) -> TreeOptions {
        let mut options = TreeOptions::new();
        if !self.keys.is_empty() {
            options = options.keys(self.keys.iter().cloned());
        }
        if self.locking {
            options = options.locking(true);
        }
        if let Some(format) = self.metadata_format {
            options = options.metadata_format(format.into());
        }
        options
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Run a parsed command line, writing command output to stdout.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out)
}
