//! Lese CLI entry point.

use anyhow::Result;
use clap::Parser;
use lese::cli::{commands, Cli, Commands};
use lese::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lese={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Ingest { path } => {
            commands::run_ingest(path, settings).await?;
        }

        Commands::Ask { question, video, model } => {
            commands::run_ask(question, *video, model.clone(), settings).await?;
        }

        Commands::Search { query, limit } => {
            commands::run_search(query, *limit, settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings).await?;
        }

        Commands::Export { input, output, format } => {
            commands::run_export(input, output.clone(), format)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
