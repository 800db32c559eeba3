//! Turn Executor: runs one agent's turn as a single logical unit.
//!
//! Between `agent_thinking` and `message_received`/`turn_complete` no
//! other mutation of the debate may occur; the manager enforces this by
//! running turns strictly sequentially.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::broadcaster::Broadcaster;
use crate::error::EngineError;
use crate::gateway::{ChatRole, ChatTurn, ModelProvider};
use crate::models::{AgentConfig, DebateConfig, Message};
use crate::prompt;
use crate::store::Store;

/// Runs one debater's turn end to end: emits `agent_thinking`, builds the
/// prompt, calls the gateway, commits the resulting message, then emits
/// `message_received` and `turn_complete`.
///
/// On cancellation or gateway failure, nothing is committed and the
/// error propagates to the caller (the manager), which decides how to
/// fail the debate.
pub async fn run_turn(
    store: &Store,
    broadcaster: &Broadcaster,
    provider: &dyn ModelProvider,
    debate_id: Uuid,
    config: &DebateConfig,
    agent: &AgentConfig,
    round_number: u32,
    turn_number: u32,
    cancel: &Arc<AtomicBool>,
) -> Result<Message, EngineError> {
    broadcaster
        .publish(
            debate_id,
            "agent_thinking",
            json!({
                "agent_id": agent.agent_id,
                "agent_name": agent.name,
                "round_number": round_number,
                "turn_number": turn_number,
            }),
        )
        .await;

    let snapshot = store.get(debate_id).await?;
    let system_prompt = prompt::build_debater_system_prompt(config, agent, round_number);
    let history_context = prompt::build_history_context(&config.topic, &snapshot.history);

    if cancel.load(Ordering::SeqCst) {
        return Err(EngineError::Cancelled(debate_id));
    }

    let content = provider
        .generate(
            &agent.binding,
            &system_prompt,
            &[ChatTurn { role: ChatRole::User, content: history_context }],
            agent.temperature,
            agent.max_tokens,
            cancel,
        )
        .await?;

    let message = Message {
        agent_id: agent.agent_id.clone(),
        agent_name: agent.name.clone(),
        stance: agent.stance.clone(),
        round_number,
        turn_number,
        content,
        timestamp: chrono::Utc::now(),
    };

    let committed = message.clone();
    store
        .update(debate_id, move |state| {
            state.history.push(committed);
            state.current_round = round_number;
            state.current_turn = turn_number;
        })
        .await?;

    info!(
        debate_id = %debate_id,
        agent_id = %agent.agent_id,
        round_number,
        turn_number,
        "turn committed"
    );

    broadcaster
        .publish(debate_id, "message_received", serde_json::to_value(&message).unwrap_or(json!({})))
        .await;
    broadcaster
        .publish(
            debate_id,
            "turn_complete",
            json!({ "round_number": round_number, "turn_number": turn_number }),
        )
        .await;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ModelProvider;
    use crate::models::{AgentRole, ModelBinding};
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl ModelProvider for EchoProvider {
        async fn generate(
            &self,
            _binding: &crate::models::ModelBinding,
            _system_prompt: &str,
            _history: &[ChatTurn],
            _temperature: f32,
            _max_tokens: u32,
            _cancel: &Arc<AtomicBool>,
        ) -> Result<String, EngineError> {
            Ok("a fine argument".to_string())
        }
    }

    fn agent(id: &str) -> AgentConfig {
        AgentConfig::new(id, id, "Pro", AgentRole::Debater, ModelBinding::new("openai", "gpt-4o-mini"))
    }

    #[tokio::test]
    async fn successful_turn_commits_message_and_emits_events() {
        let store = Store::new();
        let broadcaster = Broadcaster::new();
        let config = DebateConfig::new("topic", 1, vec![agent("a"), agent("b")]);
        let debate_id = store.create(config.clone()).await.unwrap();
        let cancel = Arc::new(AtomicBool::new(false));

        let subscription = broadcaster.subscribe(debate_id).await;
        let message = run_turn(
            &store,
            &broadcaster,
            &EchoProvider,
            debate_id,
            &config,
            &config.agents[0],
            1,
            0,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(message.content, "a fine argument");
        let snapshot = store.get(debate_id).await.unwrap();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].agent_id, "a");
        drop(subscription);
    }

    #[tokio::test]
    async fn cancelled_turn_commits_nothing() {
        let store = Store::new();
        let broadcaster = Broadcaster::new();
        let config = DebateConfig::new("topic", 1, vec![agent("a"), agent("b")]);
        let debate_id = store.create(config.clone()).await.unwrap();
        let cancel = Arc::new(AtomicBool::new(true));

        let result = run_turn(
            &store,
            &broadcaster,
            &EchoProvider,
            debate_id,
            &config,
            &config.agents[0],
            1,
            0,
            &cancel,
        )
        .await;

        assert!(result.is_err());
        let snapshot = store.get(debate_id).await.unwrap();
        assert!(snapshot.history.is_empty());
    }
}
