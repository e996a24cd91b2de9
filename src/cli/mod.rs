//! CLI module for Lese.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lese - Documentation RAG
///
/// Ingest technical documentation and video transcripts into a searchable
/// knowledge base and ask grounded questions against it. The name "Lese"
/// comes from the Norwegian word for "read."
#[derive(Parser, Debug)]
#[command(name = "lese")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Lese and verify system requirements
    Init,

    /// Ingest a document file or a directory of documents
    Ingest {
        /// Path to a .docx/.doc file or a directory containing them
        path: String,
    },

    /// Ask a question and get a grounded answer
    Ask {
        /// The question to ask
        question: String,

        /// Restrict the answer to video content, with clip citations
        #[arg(long)]
        video: bool,

        /// LLM model to use for answer generation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search for relevant content without composing an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show vector index statistics
    Stats,

    /// Render a transcript JSON file to a subtitle or text format
    Export {
        /// Path to a transcript JSON file
        input: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (txt, srt, vtt, summary)
        #[arg(long, default_value = "txt")]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
