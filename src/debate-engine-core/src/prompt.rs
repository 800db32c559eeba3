//! Deterministic prompt construction and judge-response parsing.
//!
//! Everything here is a pure function: no I/O, no randomness beyond what
//! the caller supplies. Given the same debate state and agent, the same
//! prompt comes out every time.

use serde::Deserialize;

use crate::models::{AgentConfig, AgentScore, DebateConfig, JudgeResult, Message};

/// Builds the system+context prompt for a debater's turn.
///
/// The agent's own `system_prompt` is followed by a fixed context block
/// naming the topic, the agent's stance, and the current round. Keeping
/// the block's shape stable means two calls with the same inputs always
/// produce byte-identical output.
pub fn build_debater_system_prompt(
    config: &DebateConfig,
    agent: &AgentConfig,
    round_number: u32,
) -> String {
    let mut prompt = String::new();
    if !agent.system_prompt.is_empty() {
        prompt.push_str(&agent.system_prompt);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "Topic: {}\n\
         Your stance: {}\n\
         Round {} of {}.\n\n\
         Present clear, well-reasoned arguments for your stance. Address points \
         raised by other participants where relevant. Maintain your assigned \
         persona throughout. Be persuasive but respectful. Do not include stage \
         directions, speaker labels, or markdown formatting in your response — \
         speak directly as yourself.",
        config.topic, agent.stance, round_number, config.num_rounds
    ));
    prompt
}

/// Renders the transcript so far as a single user-role message.
///
/// When `history` is empty, states that the agent opens the debate rather
/// than emitting an empty transcript block.
pub fn build_history_context(topic: &str, history: &[Message]) -> String {
    let mut out = format!("Debate topic: {}\n\n", topic);
    if history.is_empty() {
        out.push_str("You are opening the debate. No prior statements exist yet.");
        return out;
    }
    out.push_str("Transcript so far:\n");
    for message in history {
        out.push_str(&format!(
            "[Round {}, Turn {}] {} ({}): {}\n",
            message.round_number, message.turn_number, message.agent_name, message.stance, message.content
        ));
    }
    out
}

const JUDGE_INSTRUCTIONS: &str = "You are the impartial judge of this debate. Review the full \
transcript and the list of participants, then return your verdict as a single fenced JSON code \
block with exactly these fields: `summary` (string), `agent_scores` (array of objects with \
`agent_id`, `agent_name`, `score` from 0 to 10, and `reasoning`), `winner_id` (the agent_id of \
the strongest debater), `winner_name`, and `key_arguments` (array of strings). Return nothing \
outside the fenced JSON block.";

/// Builds the judge's prompt from the full transcript and participant list.
pub fn build_judge_prompt(config: &DebateConfig, history: &[Message]) -> String {
    let mut out = format!("{}\n\nTopic: {}\n\nParticipants:\n", JUDGE_INSTRUCTIONS, config.topic);
    for agent in &config.agents {
        out.push_str(&format!("- {} (agent_id: {}, stance: {})\n", agent.name, agent.agent_id, agent.stance));
    }
    out.push_str("\nFull transcript:\n");
    out.push_str(&build_history_context(&config.topic, history));
    out
}

#[derive(Debug, Deserialize, Default)]
struct RawAgentScore {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    agent_name: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawJudgeResult {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    agent_scores: Option<Vec<RawAgentScore>>,
    #[serde(default)]
    winner_id: Option<String>,
    #[serde(default)]
    winner_name: Option<String>,
    #[serde(default)]
    key_arguments: Option<Vec<String>>,
}

/// Locates the first balanced `{...}` span in `text`, preferring the
/// contents of a fenced code block if one is present. This mirrors the
/// "look for the demarcated section, fall back to the raw text" shape
/// judge/moderator output parsers in this space tend to use, since models
/// reliably wrap structured output in triple-backtick fences but not
/// always with a language tag.
fn extract_json_block(text: &str) -> Option<&str> {
    let search_space = if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
        match after_fence.find("```") {
            Some(end) => &after_fence[..end],
            None => after_fence,
        }
    } else {
        text
    };

    let open = search_space.find('{')?;
    let bytes = search_space.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[open..].iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&search_space[open..open + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses a judge's free-form response into a `JudgeResult`, salvaging
/// partial output rather than failing outright when only some fields are
/// present.
///
/// Returns `Err` only when no usable score data can be recovered at all.
pub fn parse_judge_response(text: &str, debaters: &[AgentConfig]) -> Result<JudgeResult, String> {
    let json_block = extract_json_block(text).ok_or("no JSON object found in judge response")?;
    let raw: RawJudgeResult = match serde_json::from_str(json_block) {
        Ok(raw) => raw,
        Err(_) => return Err("judge response was not valid JSON".to_string()),
    };

    let agent_scores: Vec<AgentScore> = raw
        .agent_scores
        .unwrap_or_default()
        .into_iter()
        .map(|raw_score| AgentScore {
            agent_id: raw_score.agent_id,
            agent_name: raw_score.agent_name,
            score: raw_score.score,
            reasoning: raw_score.reasoning,
        })
        .collect();

    if agent_scores.is_empty() {
        return Err("judge response contained no agent scores".to_string());
    }

    let (winner_id, winner_name) = match (raw.winner_id, raw.winner_name) {
        (Some(id), Some(name)) if !id.is_empty() => (id, name),
        _ => salvage_winner(&agent_scores, debaters),
    };

    Ok(JudgeResult {
        summary: raw.summary.unwrap_or_default(),
        agent_scores,
        winner_id,
        winner_name,
        key_arguments: raw.key_arguments.unwrap_or_default(),
    })
}

/// Derives a winner from the highest `score`, breaking ties by the
/// debater's position in the original configuration order.
///
/// `max_by` returns the *last* of equal maxima, so ties are resolved by
/// only replacing the current best on a strict improvement rather than
/// delegating to it directly.
fn salvage_winner(scores: &[AgentScore], debaters: &[AgentConfig]) -> (String, String) {
    let mut best: Option<(&AgentConfig, f32)> = None;
    for debater in debaters {
        let Some(score) = scores.iter().find(|score| score.agent_id == debater.agent_id) else {
            continue;
        };
        if best.map(|(_, b)| score.score > b).unwrap_or(true) {
            best = Some((debater, score.score));
        }
    }

    match best {
        Some((debater, _)) => (debater.agent_id.clone(), debater.name.clone()),
        None => {
            let mut fallback: Option<&AgentScore> = None;
            for score in scores {
                if fallback.map(|f| score.score > f.score).unwrap_or(true) {
                    fallback = Some(score);
                }
            }
            fallback
                .map(|score| (score.agent_id.clone(), score.agent_name.clone()))
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentRole, ModelBinding};

    fn debater(id: &str, name: &str) -> AgentConfig {
        AgentConfig::new(id, name, "Pro", AgentRole::Debater, ModelBinding::new("openai", "gpt-4o-mini"))
    }

    #[test]
    fn history_context_opens_for_empty_history() {
        let ctx = build_history_context("topic", &[]);
        assert!(ctx.contains("opening the debate"));
    }

    #[test]
    fn extract_json_block_prefers_fenced_content() {
        let text = "Here is my verdict:\n```json\n{\"summary\": \"ok\"}\n```\nThanks.";
        assert_eq!(extract_json_block(text), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn extract_json_block_handles_raw_text() {
        let text = "prefix {\"a\": {\"b\": 1}} suffix";
        assert_eq!(extract_json_block(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn parse_full_judge_response() {
        let debaters = vec![debater("a", "Alice"), debater("b", "Bob")];
        let text = r#"```json
        {"summary": "Alice won decisively",
         "agent_scores": [{"agent_id": "a", "agent_name": "Alice", "score": 8.5, "reasoning": "strong"},
                           {"agent_id": "b", "agent_name": "Bob", "score": 6.0, "reasoning": "weak"}],
         "winner_id": "a", "winner_name": "Alice",
         "key_arguments": ["point one", "point two"]}
        ```"#;
        let result = parse_judge_response(text, &debaters).unwrap();
        assert_eq!(result.winner_id, "a");
        assert_eq!(result.agent_scores.len(), 2);
        assert_eq!(result.key_arguments.len(), 2);
    }

    #[test]
    fn parse_salvages_partial_judge_response() {
        let debaters = vec![debater("a", "Alice"), debater("b", "Bob")];
        let text = r#"{"agent_scores": [{"agent_id": "a", "agent_name": "Alice", "score": 8.2},
                                           {"agent_id": "b", "agent_name": "Bob", "score": 8.1}]}"#;
        let result = parse_judge_response(text, &debaters).unwrap();
        assert_eq!(result.winner_id, "a");
        assert_eq!(result.summary, "");
        assert!(result.key_arguments.is_empty());
    }

    #[test]
    fn salvage_breaks_tied_scores_by_earliest_config_order() {
        let debaters = vec![debater("a", "Alice"), debater("b", "Bob")];
        let text = r#"{"agent_scores": [{"agent_id": "a", "agent_name": "Alice", "score": 8.0},
                                           {"agent_id": "b", "agent_name": "Bob", "score": 8.0}]}"#;
        let result = parse_judge_response(text, &debaters).unwrap();
        assert_eq!(result.winner_id, "a");
    }

    #[test]
    fn parse_fails_without_any_scores() {
        let debaters = vec![debater("a", "Alice"), debater("b", "Bob")];
        let text = "I could not reach a verdict.";
        assert!(parse_judge_response(text, &debaters).is_err());
    }
}
