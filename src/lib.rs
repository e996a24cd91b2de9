//! Lese - Documentation RAG
//!
//! A CLI tool and library for turning technical documentation and video
//! transcripts into a searchable, question-answerable knowledge base.
//!
//! The name "Lese" comes from the Norwegian word for "read."
//!
//! # Overview
//!
//! Lese allows you to:
//! - Ingest word-processing documents, including their embedded images
//! - Index video transcripts and export them as TXT, SRT, or VTT
//! - Ask questions and get grounded answers with inline image citations
//! - Search documents and transcripts semantically in one query
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `document` - Container parsing and section extraction
//! - `chunking` - Content chunking strategies
//! - `transcript` - Transcript model and subtitle formats
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index abstraction
//! - `rag` - Retrieval and context assembly
//! - `answer` - Grounded answer composition
//! - `content` - Section, image, and transcript persistence
//! - `orchestrator` - Ingestion pipeline coordination
//! - `chat` - Query-side service
//!
//! # Example
//!
//! ```rust,no_run
//! use lese::config::Settings;
//! use lese::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator.ingest_document(std::path::Path::new("guide.docx")).await?;
//!     println!("Indexed {} chunks", report.chunks);
//!
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod chat;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod content;
pub mod document;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod transcript;
pub mod vector_store;

pub use error::{LeseError, Result};
