//! Legacy document conversion.
//!
//! Older single-stream documents (`.doc`) are converted to the structured
//! container format before extraction. Conversion shells out to `soffice`,
//! falling back to `libreoffice` when the primary binary is missing.

use crate::error::{LeseError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, instrument, warn};

/// Converter binaries, tried in order.
pub const CONVERTERS: [&str; 2] = ["soffice", "libreoffice"];

/// Convert a legacy document to the structured container format.
///
/// Writes the converted file next to the requested `output_dir` and returns
/// its path. A missing primary tool falls through to the fallback; any other
/// failure is `ConversionFailed`.
#[instrument(skip_all, fields(source = %source.display()))]
pub async fn convert_to_container(source: &Path, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| LeseError::InvalidInput(format!("bad source path: {}", source.display())))?;
    let target = output_dir.join(format!("{stem}.docx"));

    let mut last_err = None;
    for (i, tool) in CONVERTERS.iter().enumerate() {
        match run_converter(tool, source, output_dir).await {
            Ok(()) => {
                if target.exists() {
                    info!(tool, "converted legacy document");
                    return Ok(target);
                }
                last_err = Some(LeseError::ConversionFailed(format!(
                    "{tool} produced no output for {}",
                    source.display()
                )));
            }
            Err(LeseError::ToolNotFound(_)) if i + 1 < CONVERTERS.len() => {
                warn!(tool, "converter not found, trying fallback");
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| LeseError::ToolNotFound(CONVERTERS[0].into())))
}

async fn run_converter(tool: &str, source: &Path, output_dir: &Path) -> Result<()> {
    let result = Command::new(tool)
        .arg("--headless")
        .arg("--convert-to").arg("docx")
        .arg("--outdir").arg(output_dir)
        .arg(source)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LeseError::ToolNotFound(tool.into()));
        }
        Err(e) => {
            return Err(LeseError::ConversionFailed(format!("{tool} execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LeseError::ConversionFailed(format!("{tool} failed: {stderr}")));
    }

    Ok(())
}
