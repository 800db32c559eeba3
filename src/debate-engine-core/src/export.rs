//! Exporting a finished (or in-progress) debate as JSON, Markdown, or
//! plain text.

use crate::error::EngineError;
use crate::models::DebateState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Renders a debate snapshot in the requested format.
pub fn export(state: &DebateState, format: ExportFormat) -> Result<Vec<u8>, EngineError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_vec_pretty(state).map_err(|e| EngineError::InvalidConfig(e.to_string()))
        }
        ExportFormat::Markdown => Ok(render_text(state, true).into_bytes()),
        ExportFormat::Text => Ok(render_text(state, false).into_bytes()),
    }
}

fn render_text(state: &DebateState, markdown: bool) -> String {
    let mut out = String::new();
    if markdown {
        out.push_str(&format!("# {}\n\n", state.config.topic));
        out.push_str(&format!(
            "Rounds: {} · Status: {:?}\n\n",
            state.config.num_rounds, state.status
        ));
        out.push_str("## Participants\n\n");
        for agent in &state.config.agents {
            out.push_str(&format!(
                "- {} ({}) — {}\n",
                agent.name,
                agent.stance,
                agent.binding.display()
            ));
        }
        out.push('\n');
        out.push_str("## Transcript\n\n");
    } else {
        out.push_str(&format!("{}\n", state.config.topic));
        out.push_str(&"=".repeat(state.config.topic.len()));
        out.push_str("\n\n");
        out.push_str(&format!(
            "Rounds: {} | Status: {:?}\n\n",
            state.config.num_rounds, state.status
        ));
        out.push_str("Participants:\n");
        for agent in &state.config.agents {
            out.push_str(&format!(
                "- {} ({}) - {}\n",
                agent.name,
                agent.stance,
                agent.binding.display()
            ));
        }
        out.push_str("\nTranscript:\n\n");
    }

    let mut last_round = 0;
    for message in &state.history {
        if message.round_number != last_round {
            last_round = message.round_number;
            if markdown {
                out.push_str(&format!("### Round {}\n\n", last_round));
            } else {
                out.push_str(&format!("-- Round {} --\n", last_round));
            }
        }
        if markdown {
            out.push_str(&format!("**{} ({})**\n\n{}\n\n", message.agent_name, message.stance, message.content));
        } else {
            out.push_str(&format!("{} ({}):\n{}\n\n", message.agent_name, message.stance, message.content));
        }
    }

    if let Some(result) = &state.judge_result {
        if markdown {
            out.push_str("## Judgment\n\n");
            out.push_str(&format!("**Winner:** {}\n\n", result.winner_name));
            out.push_str(&format!("{}\n\n", result.summary));
            out.push_str("### Scores\n\n");
            for score in &result.agent_scores {
                out.push_str(&format!("- {}: {:.1} — {}\n", score.agent_name, score.score, score.reasoning));
            }
            if !result.key_arguments.is_empty() {
                out.push_str("\n### Key arguments\n\n");
                for argument in &result.key_arguments {
                    out.push_str(&format!("- {}\n", argument));
                }
            }
        } else {
            out.push_str("Judgment\n--------\n\n");
            out.push_str(&format!("Winner: {}\n\n", result.winner_name));
            out.push_str(&format!("{}\n\n", result.summary));
            out.push_str("Scores:\n");
            for score in &result.agent_scores {
                out.push_str(&format!("- {}: {:.1} - {}\n", score.agent_name, score.score, score.reasoning));
            }
            if !result.key_arguments.is_empty() {
                out.push_str("\nKey arguments:\n");
                for argument in &result.key_arguments {
                    out.push_str(&format!("- {}\n", argument));
                }
            }
        }
    }

    out
}
