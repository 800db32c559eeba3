//! End-to-end tests exercising the public API surface together: manager,
//! store, and broadcaster through a scripted provider, without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use debate_engine_core::{
    AgentConfig, AgentRole, DebateConfig, DebateManager, DebateState, DebateStatus, EngineError,
    ModelBinding, ModelProvider,
};

struct ScriptedProvider {
    response: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn generate(
        &self,
        _binding: &ModelBinding,
        _system_prompt: &str,
        _history: &[debate_engine_core::gateway::ChatTurn],
        _temperature: f32,
        _max_tokens: u32,
        _cancel: &Arc<AtomicBool>,
    ) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

fn three_agent_config() -> DebateConfig {
    let binding = ModelBinding::new("openai", "gpt-4o-mini");
    let agents = vec![
        AgentConfig::new("a", "Alice", "Pro", AgentRole::Debater, binding.clone()),
        AgentConfig::new("b", "Bob", "Con", AgentRole::Debater, binding.clone()),
        AgentConfig::new("c", "Carol", "Neutral", AgentRole::Debater, binding),
    ];
    DebateConfig::new("Should cities ban private cars downtown?", 2, agents)
}

async fn wait_for_terminal(manager: &DebateManager, id: uuid::Uuid) -> DebateState {
    for _ in 0..300 {
        let state = manager.get(id).await.unwrap();
        if matches!(state.status, DebateStatus::Completed | DebateStatus::Failed) {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("debate never reached a terminal state");
}

#[tokio::test]
async fn three_agent_two_round_debate_produces_six_messages_in_order() {
    let provider = Arc::new(ScriptedProvider {
        response: "a well-reasoned argument".into(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let manager = DebateManager::new(provider.clone());
    let id = manager.create(three_agent_config()).await.unwrap();

    let mut subscription = manager.broadcaster().subscribe(id).await;
    manager.start(id).await.unwrap();

    let final_state = wait_for_terminal(&manager, id).await;
    assert_eq!(final_state.status, DebateStatus::Completed);
    assert_eq!(final_state.history.len(), 6);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);

    for (round_number, chunk) in final_state.history.chunks(3).enumerate() {
        for (turn_number, message) in chunk.iter().enumerate() {
            assert_eq!(message.round_number, round_number as u32 + 1);
            assert_eq!(message.turn_number, turn_number as u32);
        }
    }

    let mut event_types = Vec::new();
    while let Ok(envelope) = subscription.receiver.try_recv() {
        event_types.push(envelope.event_type);
    }
    assert!(event_types.contains(&"debate_started".to_string()));
    assert!(event_types.contains(&"debate_complete".to_string()));
    assert_eq!(event_types.iter().filter(|e| *e == "round_started").count(), 2);
    assert_eq!(event_types.iter().filter(|e| *e == "message_received").count(), 6);
}

#[tokio::test]
async fn cancelling_a_running_debate_removes_its_record() {
    let provider = Arc::new(ScriptedProvider {
        response: "an argument".into(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let manager = DebateManager::new(provider);
    let id = manager.create(three_agent_config()).await.unwrap();
    manager.start(id).await.unwrap();
    manager.cancel(id).await.unwrap();

    let result = manager.get(id).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_a_debate_is_created() {
    let provider = Arc::new(ScriptedProvider {
        response: String::new(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let manager = DebateManager::new(provider);
    let lonely_agent = DebateConfig::new(
        "too few debaters",
        1,
        vec![AgentConfig::new(
            "a",
            "Alice",
            "Pro",
            AgentRole::Debater,
            ModelBinding::new("openai", "gpt-4o-mini"),
        )],
    );

    let result = manager.create(lonely_agent).await;
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}
