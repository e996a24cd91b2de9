//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::error::{LeseError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion requires an API key for embedding.
    Ingest,
    /// Asking questions requires an API key.
    Ask,
    /// Search requires an API key to embed the query.
    Search,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Ask | Operation::Search => {
            check_api_key()?;
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(LeseError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(LeseError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(LeseError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LeseError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(LeseError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
