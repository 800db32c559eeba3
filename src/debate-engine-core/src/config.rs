//! Configuration: the Config Catalog plus default debater/judge prompt
//! templates, loadable from a TOML file with an embedded fallback.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::catalog::{default_catalog, Catalog};
use crate::error::EngineError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_catalog")]
    pub catalog: Catalog,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Default system-prompt templates, with `{name}`, `{topic}`, and
/// `{stance}` placeholders filled in at agent-construction time.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_debater_prompt")]
    pub debater_prompt: String,
    #[serde(default = "default_judge_prompt")]
    pub judge_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            debater_prompt: default_debater_prompt(),
            judge_prompt: default_judge_prompt(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::InvalidConfig(format!("failed to read config: {}", e)))?;
        Self::from_str(&content)
    }

    /// Loads configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content)
            .map_err(|e| EngineError::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    /// Renders a debater's system prompt template with its name, topic,
    /// and stance substituted in.
    pub fn render_debater_prompt(&self, name: &str, topic: &str, stance: &str) -> String {
        self.prompts
            .debater_prompt
            .replace("{name}", name)
            .replace("{topic}", topic)
            .replace("{stance}", stance)
    }
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// The configuration embedded in the binary, used whenever no
/// `config.toml` is present.
pub fn default_config() -> Config {
    Config {
        catalog: default_catalog(),
        prompts: PromptsConfig::default(),
    }
}

fn default_debater_prompt() -> String {
    DEFAULT_DEBATER_PROMPT.to_string()
}

fn default_judge_prompt() -> String {
    DEFAULT_JUDGE_PROMPT.to_string()
}

const DEFAULT_DEBATER_PROMPT: &str = r#"You are {name} participating in a formal debate.

DEBATE TOPIC: {topic}
YOUR STANCE: {stance}

DEBATE RULES:
- Present clear, compelling arguments supported by evidence and reasoning
- Address the specific question or topic directly
- Acknowledge and counter your opponents' arguments respectfully
- Maintain a professional tone throughout
- Do NOT acknowledge being an AI - stay fully in character

CRITICAL OUTPUT RULES:
- Output ONLY your spoken words - no scene directions or stage actions
- Do NOT include any text in parentheses like "(pauses)" or "(leans forward)"
- Do NOT include narration, descriptions of gestures, movements, or tone
- Do NOT include asterisks for emphasis or any markdown formatting
"#;

const DEFAULT_JUDGE_PROMPT: &str = r#"You are the impartial judge of this debate. Evaluate the
arguments on their merits alone: evidence, logical consistency, and direct engagement with the
opposing side. Do not favor a stance for any reason other than the quality of its defense.
"#;
