//! Debate Manager: the lifecycle state machine and sole writer while a
//! debate executes.
//!
//! `start` spawns a background task and returns immediately. The task
//! owns the debate until it reaches a terminal status; cancellation is a
//! flag checked at the task's suspension points (gateway calls, the
//! inter-turn delay, event publish), matching the "threads + stop flags"
//! shape used elsewhere for cancellable background work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::broadcaster::Broadcaster;
use crate::error::EngineError;
use crate::executor;
use crate::gateway::{ChatRole, ChatTurn, ModelProvider};
use crate::models::{DebateConfig, DebateState, DebateStatus};
use crate::prompt;
use crate::store::Store;

/// Fixed delay between turns to smooth provider rate limits. Not
/// configurable: see the design notes on why this stays a constant.
pub const INTER_TURN_DELAY: Duration = Duration::from_secs(1);

/// Orchestrates debate creation, execution, and cancellation.
#[derive(Clone)]
pub struct DebateManager {
    store: Store,
    broadcaster: Broadcaster,
    provider: Arc<dyn ModelProvider>,
    cancel_flags: Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl DebateManager {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            store: Store::new(),
            broadcaster: Broadcaster::new(),
            provider,
            cancel_flags: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Validates and persists a new debate in `CREATED` status.
    pub async fn create(&self, config: DebateConfig) -> Result<Uuid, EngineError> {
        self.store.create(config).await
    }

    pub async fn get(&self, id: Uuid) -> Result<DebateState, EngineError> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Vec<DebateState> {
        self.store.list().await
    }

    /// Attaches to a debate's event topic, returning the current snapshot
    /// alongside the subscription. A `connection_established` envelope
    /// reflecting that snapshot is prepended to the returned backlog so a
    /// subscriber can render its starting state without a separate call —
    /// this envelope is synthesized per-subscriber and is not written to
    /// the shared topic log.
    pub async fn subscribe(
        &self,
        id: Uuid,
    ) -> Result<(DebateState, crate::broadcaster::Subscription), EngineError> {
        let snapshot = self.store.get(id).await?;
        let mut subscription = self.broadcaster.subscribe(id).await;
        let established = crate::broadcaster::Envelope {
            sequence: 0,
            event_type: "connection_established".to_string(),
            debate_id: id,
            payload: json!({
                "status": snapshot.status,
                "current_round": snapshot.current_round,
                "current_turn": snapshot.current_turn,
                "message_count": snapshot.history.len(),
            }),
            timestamp: snapshot.created_at,
        };
        subscription.backlog.insert(0, established);
        Ok((snapshot, subscription))
    }

    /// Transitions a `CREATED` debate to `IN_PROGRESS` and spawns its
    /// execution task. Returns once the transition is committed; the
    /// debate itself continues running in the background.
    ///
    /// The CREATED check and the transition happen inside a single
    /// `store.update` call so they execute under one acquisition of the
    /// per-entry lock — two concurrent callers can never both observe
    /// CREATED and both spawn a task for the same debate.
    pub async fn start(&self, id: Uuid) -> Result<(), EngineError> {
        let transitioned = Arc::new(AtomicBool::new(false));
        let transitioned_flag = transitioned.clone();
        let state = self
            .store
            .update(id, move |state| {
                if state.status == DebateStatus::Created {
                    state.status = DebateStatus::InProgress;
                    state.started_at = Some(chrono::Utc::now());
                    transitioned_flag.store(true, Ordering::SeqCst);
                }
            })
            .await?;

        if !transitioned.load(Ordering::SeqCst) {
            return Err(EngineError::InvalidTransition {
                id,
                detail: format!("cannot start a debate in status {:?}", state.status),
            });
        }

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags.lock().await.insert(id, cancel.clone());

        let store = self.store.clone();
        let broadcaster = self.broadcaster.clone();
        let provider = self.provider.clone();
        let config = state.config.clone();

        tokio::spawn(async move {
            run_debate(store, broadcaster, provider, id, config, cancel).await;
        });

        Ok(())
    }

    /// Cancels a running debate and removes its record. The task's next
    /// suspension point observes the flag and exits without committing
    /// further state.
    pub async fn cancel(&self, id: Uuid) -> Result<(), EngineError> {
        if let Some(flag) = self.cancel_flags.lock().await.remove(&id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.store.delete(id).await?;
        self.broadcaster.remove_topic(id).await;
        Ok(())
    }
}

async fn run_debate(
    store: Store,
    broadcaster: Broadcaster,
    provider: Arc<dyn ModelProvider>,
    debate_id: Uuid,
    config: DebateConfig,
    cancel: Arc<AtomicBool>,
) {
    info!(debate_id = %debate_id, "debate started");
    broadcaster
        .publish(
            debate_id,
            "debate_started",
            json!({
                "topic": config.topic,
                "num_rounds": config.num_rounds,
                "num_agents": config.agents.len(),
            }),
        )
        .await;

    if let Err(err) = run_rounds(&store, &broadcaster, provider.as_ref(), debate_id, &config, &cancel).await {
        fail_debate(&store, &broadcaster, debate_id, &err).await;
        return;
    }

    if cancel.load(Ordering::SeqCst) {
        return;
    }

    if let Some(judge) = &config.judge {
        if let Err(err) = run_judging(&store, &broadcaster, provider.as_ref(), debate_id, &config, judge, &cancel).await {
            fail_debate(&store, &broadcaster, debate_id, &err).await;
            return;
        }
    }

    if cancel.load(Ordering::SeqCst) {
        return;
    }

    let completed_at = chrono::Utc::now();
    let final_state = match store
        .update(debate_id, move |state| {
            state.status = DebateStatus::Completed;
            state.completed_at = Some(completed_at);
        })
        .await
    {
        Ok(state) => state,
        Err(err) => {
            error!(debate_id = %debate_id, error = %err, "failed to commit completion");
            return;
        }
    };

    let (winner_id, winner_name) = final_state
        .judge_result
        .as_ref()
        .map(|result| (result.winner_id.clone(), result.winner_name.clone()))
        .unwrap_or_default();

    broadcaster
        .publish(
            debate_id,
            "debate_complete",
            json!({
                "winner_id": winner_id,
                "winner_name": winner_name,
                "total_messages": final_state.history.len(),
            }),
        )
        .await;
    info!(debate_id = %debate_id, "debate completed");
}

async fn run_rounds(
    store: &Store,
    broadcaster: &Broadcaster,
    provider: &dyn ModelProvider,
    debate_id: Uuid,
    config: &DebateConfig,
    cancel: &Arc<AtomicBool>,
) -> Result<(), EngineError> {
    for round_number in 1..=config.num_rounds {
        if cancel.load(Ordering::SeqCst) {
            return Ok(());
        }
        broadcaster
            .publish(
                debate_id,
                "round_started",
                json!({ "round_number": round_number, "total_rounds": config.num_rounds }),
            )
            .await;

        for (turn_number, agent) in config.agents.iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            executor::run_turn(
                store,
                broadcaster,
                provider,
                debate_id,
                config,
                agent,
                round_number,
                turn_number as u32,
                cancel,
            )
            .await?;

            let is_last_turn_of_debate =
                round_number == config.num_rounds && turn_number + 1 == config.agents.len();
            if !is_last_turn_of_debate {
                tokio::time::sleep(INTER_TURN_DELAY).await;
            }
        }

        broadcaster
            .publish(debate_id, "round_complete", json!({ "round_number": round_number }))
            .await;
    }
    Ok(())
}

async fn run_judging(
    store: &Store,
    broadcaster: &Broadcaster,
    provider: &dyn ModelProvider,
    debate_id: Uuid,
    config: &DebateConfig,
    judge: &crate::models::AgentConfig,
    cancel: &Arc<AtomicBool>,
) -> Result<(), EngineError> {
    let snapshot = store.get(debate_id).await?;
    broadcaster
        .publish(debate_id, "judging_started", json!({ "message_count": snapshot.history.len() }))
        .await;

    let judge_prompt = prompt::build_judge_prompt(config, &snapshot.history);
    let response = provider
        .generate(
            &judge.binding,
            &judge.system_prompt,
            &[ChatTurn { role: ChatRole::User, content: judge_prompt }],
            judge.temperature,
            judge.max_tokens,
            cancel,
        )
        .await?;

    let debaters: Vec<_> = config.agents.clone();
    let result = prompt::parse_judge_response(&response, &debaters)
        .map_err(EngineError::JudgeUnparseable)?;

    let result_clone = result.clone();
    store
        .update(debate_id, move |state| {
            state.judge_result = Some(result_clone);
        })
        .await?;

    broadcaster
        .publish(debate_id, "judge_result", serde_json::to_value(&result).unwrap_or(json!({})))
        .await;

    Ok(())
}

async fn fail_debate(store: &Store, broadcaster: &Broadcaster, debate_id: Uuid, err: &EngineError) {
    if matches!(err, EngineError::Cancelled(_)) {
        return;
    }
    error!(debate_id = %debate_id, error = %err, "debate failed");
    let message = err.to_string();
    let message_clone = message.clone();
    let _ = store
        .update(debate_id, move |state| {
            state.status = DebateStatus::Failed;
            state.error_message = Some(message_clone);
            state.completed_at = Some(chrono::Utc::now());
        })
        .await;
    broadcaster
        .publish(
            debate_id,
            "error",
            json!({ "error_kind": err.kind(), "error_message": message }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentConfig, AgentRole, ModelBinding};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedProvider {
        debater_response: String,
        judge_response: String,
        fail_calls: Arc<AtomicUsize>,
        fail_until: usize,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn generate(
            &self,
            _binding: &crate::models::ModelBinding,
            system_prompt: &str,
            _history: &[ChatTurn],
            _temperature: f32,
            _max_tokens: u32,
            _cancel: &Arc<AtomicBool>,
        ) -> Result<String, EngineError> {
            let call = self.fail_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                return Err(EngineError::UpstreamUnavailable {
                    provider: "test".into(),
                    model: "test".into(),
                    cause: "scripted failure".into(),
                });
            }
            if system_prompt.contains("impartial judge") || system_prompt.is_empty() {
                Ok(self.judge_response.clone())
            } else {
                Ok(self.debater_response.clone())
            }
        }
    }

    fn two_agent_config(with_judge: bool) -> DebateConfig {
        let a = AgentConfig::new("a", "Alice", "Pro", AgentRole::Debater, ModelBinding::new("openai", "m"));
        let b = AgentConfig::new("b", "Bob", "Con", AgentRole::Debater, ModelBinding::new("openai", "m"));
        let mut config = DebateConfig::new("topic", 2, vec![a, b]);
        if with_judge {
            let judge = AgentConfig::new("j", "Judge", "Neutral", AgentRole::Judge, ModelBinding::new("openai", "m"))
                .with_system_prompt("You are the impartial judge.");
            config = config.with_judge(judge);
        }
        config
    }

    #[tokio::test]
    async fn full_debate_with_judge_completes() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: r#"{"summary": "close", "agent_scores": [
                {"agent_id": "a", "agent_name": "Alice", "score": 7.5, "reasoning": "strong"},
                {"agent_id": "b", "agent_name": "Bob", "score": 6.0, "reasoning": "weaker"}],
                "winner_id": "a", "winner_name": "Alice", "key_arguments": ["x"]}"#
                .into(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 0,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(true)).await.unwrap();
        let subscription = manager.broadcaster().subscribe(id).await;
        manager.start(id).await.unwrap();

        let final_state = wait_for_terminal(&manager, id).await;
        assert_eq!(final_state.status, DebateStatus::Completed);
        assert_eq!(final_state.history.len(), 4);
        assert_eq!(final_state.judge_result.unwrap().winner_id, "a");
        drop(subscription);
    }

    #[tokio::test]
    async fn debate_without_judge_completes_without_result() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: String::new(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 0,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(false)).await.unwrap();
        manager.start(id).await.unwrap();

        let final_state = wait_for_terminal(&manager, id).await;
        assert_eq!(final_state.status, DebateStatus::Completed);
        assert!(final_state.judge_result.is_none());
    }

    #[tokio::test]
    async fn permanent_upstream_failure_fails_debate_preserving_partial_history() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: String::new(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 100,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(false)).await.unwrap();
        manager.start(id).await.unwrap();

        let final_state = wait_for_terminal(&manager, id).await;
        assert_eq!(final_state.status, DebateStatus::Failed);
        assert!(final_state.history.is_empty());
        assert!(final_state.error_message.is_some());
    }

    #[tokio::test]
    async fn starting_twice_fails_the_second_call() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: String::new(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 0,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(false)).await.unwrap();
        manager.start(id).await.unwrap();
        let second = manager.start(id).await;
        assert!(second.is_err());
        wait_for_terminal(&manager, id).await;
    }

    #[tokio::test]
    async fn concurrent_starts_admit_exactly_one_winner() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: String::new(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 0,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(false)).await.unwrap();

        let (first, second) = tokio::join!(manager.start(id), manager.start(id));
        let successes = [&first, &second].into_iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        wait_for_terminal(&manager, id).await;
    }

    #[tokio::test]
    async fn subscribe_prepends_connection_established_to_backlog() {
        let provider = Arc::new(ScriptedProvider {
            debater_response: "an argument".into(),
            judge_response: String::new(),
            fail_calls: Arc::new(AtomicUsize::new(0)),
            fail_until: 0,
        });
        let manager = DebateManager::new(provider);
        let id = manager.create(two_agent_config(false)).await.unwrap();

        let (snapshot, subscription) = manager.subscribe(id).await.unwrap();
        assert_eq!(snapshot.status, DebateStatus::Created);
        assert_eq!(subscription.backlog.len(), 1);
        assert_eq!(subscription.backlog[0].event_type, "connection_established");
        assert_eq!(subscription.backlog[0].payload["message_count"], 0);
    }

    async fn wait_for_terminal(manager: &DebateManager, id: Uuid) -> DebateState {
        for _ in 0..200 {
            let state = manager.get(id).await.unwrap();
            if matches!(state.status, DebateStatus::Completed | DebateStatus::Failed) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("debate did not reach a terminal state in time");
    }
}
