//! Stats command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the stats command.
pub async fn run_stats(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let stats = orchestrator.index().stats().await?;

    Output::header("Vector index");
    Output::kv("total vectors", &stats.total_vectors.to_string());

    if stats.namespaces.is_empty() {
        Output::info("The index is empty. Ingest content with 'lese ingest'.");
        return Ok(());
    }

    Output::header("Namespaces");
    for (namespace, count) in &stats.namespaces {
        let name = if namespace.is_empty() { "(default)" } else { namespace };
        Output::kv(name, &count.to_string());
    }

    Ok(())
}
