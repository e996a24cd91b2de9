//! Init command implementation.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::document::convert::CONVERTERS;
use anyhow::Result;

/// Run the init command.
pub fn run_init(settings: &Settings) -> Result<()> {
    Output::header("Lese initialization");

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config already exists at {}", config_path.display()));
    } else {
        settings.save()?;
        Output::success(&format!("Created config at {}", config_path.display()));
    }

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.storage_dir())?;
    Output::success(&format!("Data directory: {}", settings.data_dir().display()));

    if crate::openai::has_api_key() {
        Output::success("OPENAI_API_KEY is set");
    } else {
        Output::warning("OPENAI_API_KEY is not set; ingest and ask will not work");
    }

    // Legacy .doc files need an office converter on the PATH.
    let converter = CONVERTERS.iter().find(|c| preflight::check_tool(c).is_ok());
    match converter {
        Some(name) => Output::success(&format!("Document converter found: {}", name)),
        None => Output::warning(
            "No document converter found (soffice/libreoffice); legacy .doc files cannot be ingested",
        ),
    }

    Ok(())
}
