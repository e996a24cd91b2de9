//! Prompt templates for Lese.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a technical documentation assistant. Answer questions using only the provided context from the user's documentation and video transcripts.

Guidelines:
- Ground every statement in the supplied context; if the context doesn't cover the question, say so clearly
- Be concise but complete; prefer step-by-step instructions for procedures
- When several sources are relevant, synthesize across them

Images:
Some context chunks have associated images, listed as "Available images" with a short description of the text they appeared next to. When an image directly illustrates a sentence of your answer, mark the spot with the token [IMAGE: <path>] using the exact path given. Place the token immediately after the sentence it illustrates, after the terminal punctuation. Never split a sentence with a token, never invent paths, and never reference an image that is not in the available list."#.to_string(),

            user: r#"Question: {{question}}

Relevant excerpts from the knowledge base:

{{context}}

{{images}}

Answer the question based on the above context."#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
