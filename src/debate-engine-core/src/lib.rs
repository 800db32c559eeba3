//! Debate Engine Core
//!
//! Orchestrates turn-based debates among multiple LLM agents: the model
//! gateway, prompt construction, in-memory store, event broadcaster,
//! turn executor, lifecycle manager, and provider catalog.

pub mod broadcaster;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod gateway;
pub mod manager;
pub mod models;
pub mod prompt;
pub mod store;

pub use broadcaster::{Broadcaster, Envelope, Subscription};
pub use catalog::{default_catalog, Catalog, ModelEntry, ProviderEntry};
pub use config::Config;
pub use error::EngineError;
pub use export::{export, ExportFormat};
pub use gateway::{ModelProvider, OpenAiGateway};
pub use manager::DebateManager;
pub use models::{
    AgentConfig, AgentRole, AgentScore, DebateConfig, DebateState, DebateStatus, JudgeResult,
    Message, ModelBinding,
};
pub use store::Store;
