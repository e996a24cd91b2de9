//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(path: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let path = Path::new(path);

    if path.is_dir() {
        let spinner = Output::spinner(&format!("Ingesting documents from {}...", path.display()));
        let report = orchestrator.ingest_directory(path).await?;
        spinner.finish_and_clear();

        for ingest in &report.succeeded {
            Output::success(&format!(
                "{}: {} sections, {} images, {} chunks",
                ingest.source, ingest.sections, ingest.images, ingest.chunks
            ));
        }
        for (source, error) in &report.failed {
            Output::error(&format!("{}: {}", source, error));
        }

        Output::header("Batch result");
        Output::kv("succeeded", &report.succeeded.len().to_string());
        Output::kv("failed", &report.failed.len().to_string());

        if report.succeeded.is_empty() && !report.failed.is_empty() {
            anyhow::bail!("all documents failed to ingest");
        }
    } else {
        let spinner = Output::spinner(&format!("Ingesting {}...", path.display()));
        let report = orchestrator.ingest_document(path).await;
        spinner.finish_and_clear();

        match report {
            Ok(ingest) => {
                Output::success(&format!("Ingested {}", ingest.source));
                Output::kv("document id", &ingest.doc_id);
                Output::kv("sections", &ingest.sections.to_string());
                Output::kv("images", &ingest.images.to_string());
                Output::kv("chunks", &ingest.chunks.to_string());
            }
            Err(e) => {
                Output::error(&format!("Ingestion failed: {}", e));
                return Err(e.into());
            }
        }
    }

    Ok(())
}
