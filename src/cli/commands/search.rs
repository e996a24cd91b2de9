//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Retriever;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings.clone())?;
    let retriever = Retriever::new(
        orchestrator.embedder(),
        orchestrator.index(),
        settings.retrieval_namespaces(),
    );

    let spinner = Output::spinner("Searching...");
    let results = retriever.retrieve(query, limit, None).await;
    spinner.finish_and_clear();

    match results {
        Ok(contexts) => {
            if contexts.is_empty() {
                Output::info("No results found.");
                return Ok(());
            }
            for context in &contexts {
                let detail = context
                    .time_range()
                    .map(|range| format!("@ {}", range))
                    .unwrap_or_else(|| context.section_title.clone().unwrap_or_default());
                Output::search_result(&context.source, &detail, context.score, &context.text);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
