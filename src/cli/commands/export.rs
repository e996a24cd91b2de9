//! Export command implementation.

use crate::cli::Output;
use crate::transcript::{format_transcript, OutputFormat, Transcript};
use anyhow::Result;
use std::str::FromStr;

/// Run the export command.
pub fn run_export(input: &str, output: Option<String>, format: &str) -> Result<()> {
    let format = OutputFormat::from_str(format)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let json = std::fs::read_to_string(input)?;
    let transcript: Transcript = serde_json::from_str(&json)?;
    let rendered = format_transcript(&transcript, format);

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            Output::success(&format!("Exported {} to {}", transcript.video_id, path));
        }
        None => {
            print!("{}", rendered);
        }
    }

    Ok(())
}
