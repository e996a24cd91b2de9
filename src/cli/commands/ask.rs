//! Ask command implementation.

use crate::answer::{AnswerComposer, OpenAIGenerator};
use crate::chat::{ChatService, ConversationState};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::orchestrator::Orchestrator;
use crate::rag::Retriever;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    video: bool,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let service = build_chat_service(&orchestrator, model)?;
    let spinner = Output::spinner("Searching knowledge base...");

    if video {
        let response = service.ask_video(question).await;
        spinner.finish_and_clear();
        let answer = match response {
            Ok(answer) => answer,
            Err(e) => {
                Output::error(&format!("Failed to answer: {}", e));
                return Err(e.into());
            }
        };

        if !answer.success {
            Output::warning("The knowledge base is empty. Ingest content first with 'lese ingest'.");
            return Ok(());
        }
        if answer.filter_relaxed {
            Output::warning("No video content matched; showing related documentation instead.");
        }
        println!("\n{}\n", answer.answer);
        print_sources(&answer.sources);
    } else {
        let mut state = ConversationState::default();
        let response = service.ask(question, &mut state).await;
        spinner.finish_and_clear();
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                Output::error(&format!("Failed to answer: {}", e));
                return Err(e.into());
            }
        };

        if !response.success {
            Output::warning("The knowledge base is empty. Ingest content first with 'lese ingest'.");
            return Ok(());
        }
        if let Some(answer) = &response.answer {
            println!("\n{}\n", answer);
        }
        for image in &response.images {
            Output::list_item(&format!("image at offset {}: {}", image.offset, image.path));
        }
        Output::kv("confidence", &format!("{:.3}", response.confidence));
        print_sources(&response.sources);
    }

    Ok(())
}

/// Wire the query-side service from orchestrator components.
pub fn build_chat_service(
    orchestrator: &Orchestrator,
    model: Option<String>,
) -> Result<ChatService> {
    let settings = orchestrator.settings();
    let model = model.unwrap_or_else(|| settings.answer.model.clone());

    let retriever = Retriever::new(
        orchestrator.embedder(),
        orchestrator.index(),
        settings.retrieval_namespaces(),
    );
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let composer = AnswerComposer::new(
        Arc::new(OpenAIGenerator::new(&model)),
        prompts,
        settings.answer.clone(),
        settings.retrieval.max_context_chars,
    );

    Ok(ChatService::new(
        retriever,
        composer,
        orchestrator.index(),
        settings.retrieval.top_k,
    ))
}

fn print_sources(sources: &[crate::rag::RetrievedContext]) {
    if sources.is_empty() {
        return;
    }
    Output::header("Sources");
    for source in sources {
        let detail = source
            .time_range()
            .map(|range| format!("@ {}", range))
            .unwrap_or_else(|| source.section_title.clone().unwrap_or_default());
        Output::search_result(&source.source, &detail, source.score, &source.text);
    }
}
