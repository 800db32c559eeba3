//! Core data model: agents, messages, debate configuration and state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the conversation an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Debater,
    Judge,
}

/// Where and how to reach a model: provider, model name, and an optional
/// pointer to the environment variable holding its credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBinding {
    pub provider: String,
    pub model: String,
    /// Name of an environment variable to read the API key from. Absent
    /// for providers that need no credential (a local Ollama-style
    /// endpoint, for instance).
    pub api_key_env: Option<String>,
    /// Overrides the provider catalog's default base URL.
    pub api_base: Option<String>,
}

impl ModelBinding {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key_env: None,
            api_base: None,
        }
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// `provider/model`, used in exports and logs.
    pub fn display(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// One configured participant: a debater or the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub name: String,
    /// Free text: "Pro", "Con", "Neutral", or anything else the caller wants.
    pub stance: String,
    pub role: AgentRole,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub binding: ModelBinding,
}

impl AgentConfig {
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        stance: impl Into<String>,
        role: AgentRole,
        binding: ModelBinding,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            stance: stance.into(),
            role,
            system_prompt: String::new(),
            temperature: 0.8,
            max_tokens: 1024,
            binding,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Immutable description of a debate, submitted at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub topic: String,
    pub num_rounds: u32,
    pub agents: Vec<AgentConfig>,
    pub judge: Option<AgentConfig>,
}

impl DebateConfig {
    pub fn new(topic: impl Into<String>, num_rounds: u32, agents: Vec<AgentConfig>) -> Self {
        Self {
            topic: topic.into(),
            num_rounds,
            agents,
            judge: None,
        }
    }

    pub fn with_judge(mut self, judge: AgentConfig) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Validates the invariants from the data model before a debate is created.
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        use crate::error::EngineError;

        if self.num_rounds < 1 {
            return Err(EngineError::InvalidConfig(
                "num_rounds must be at least 1".into(),
            ));
        }
        if self.agents.len() < 2 {
            return Err(EngineError::InvalidConfig(
                "a debate requires at least 2 agents".into(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(EngineError::InvalidConfig("topic must not be empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            validate_agent_fields(agent)?;
            if !seen.insert(agent.agent_id.as_str()) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate agent_id: {}",
                    agent.agent_id
                )));
            }
            if agent.role != AgentRole::Debater {
                return Err(EngineError::InvalidConfig(format!(
                    "agent {} listed as a debater must have role Debater",
                    agent.agent_id
                )));
            }
        }

        if let Some(judge) = &self.judge {
            validate_agent_fields(judge)?;
            if judge.role != AgentRole::Judge {
                return Err(EngineError::InvalidConfig(
                    "judge_config.role must be Judge".into(),
                ));
            }
            if !seen.insert(judge.agent_id.as_str()) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate agent_id: {}",
                    judge.agent_id
                )));
            }
        }

        Ok(())
    }
}

/// Field-level well-formedness shared by every agent, debater or judge:
/// non-empty identity, temperature in range, and a usable token budget.
fn validate_agent_fields(agent: &AgentConfig) -> Result<(), crate::error::EngineError> {
    use crate::error::EngineError;

    if agent.agent_id.is_empty() || agent.name.is_empty() {
        return Err(EngineError::InvalidConfig(
            "agent_id and name must not be empty".into(),
        ));
    }
    if !(0.0..=2.0).contains(&agent.temperature) {
        return Err(EngineError::InvalidConfig(format!(
            "temperature out of range for {}: {}",
            agent.agent_id, agent.temperature
        )));
    }
    if agent.max_tokens < 1 {
        return Err(EngineError::InvalidConfig(format!(
            "max_tokens must be at least 1 for {}",
            agent.agent_id
        )));
    }
    Ok(())
}

/// One committed contribution to the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub agent_id: String,
    pub agent_name: String,
    pub stance: String,
    pub round_number: u32,
    pub turn_number: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A single debater's score from the judge.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentScore {
    pub agent_id: String,
    pub agent_name: String,
    pub score: f32,
    pub reasoning: String,
}

/// The judge's verdict.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JudgeResult {
    pub summary: String,
    pub agent_scores: Vec<AgentScore>,
    pub winner_id: String,
    pub winner_name: String,
    pub key_arguments: Vec<String>,
}

/// Where a debate sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebateStatus {
    Created,
    InProgress,
    Completed,
    Failed,
}

/// The full mutable record the store keeps for one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateState {
    pub debate_id: Uuid,
    pub config: DebateConfig,
    pub status: DebateStatus,
    pub current_round: u32,
    pub current_turn: u32,
    pub history: Vec<Message>,
    pub judge_result: Option<JudgeResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DebateState {
    pub fn new(debate_id: Uuid, config: DebateConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            debate_id,
            config,
            status: DebateStatus::Created,
            current_round: 0,
            current_turn: 0,
            history: Vec::new(),
            judge_result: None,
            error_message: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }
}
