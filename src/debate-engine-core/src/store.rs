//! In-memory, concurrency-safe repository of debate records.
//!
//! Reads return deep-copied snapshots so callers never observe a record
//! mid-mutation and never alias the store's internal state. A global
//! lock guards map membership (`create`/`delete`); a per-entry lock
//! serializes mutation of one debate without blocking reads or writers
//! of unrelated debates.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{DebateConfig, DebateState};

type Entry = Arc<Mutex<DebateState>>;

#[derive(Clone, Default)]
pub struct Store {
    records: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and persists a new debate in `CREATED` status, returning
    /// its freshly assigned id.
    pub async fn create(&self, config: DebateConfig) -> Result<Uuid, EngineError> {
        config.validate()?;
        let id = Uuid::new_v4();
        let state = DebateState::new(id, config, Utc::now());
        let mut map = self.records.write().await;
        map.insert(id, Arc::new(Mutex::new(state)));
        Ok(id)
    }

    /// Returns a deep-copied snapshot of one debate.
    pub async fn get(&self, id: Uuid) -> Result<DebateState, EngineError> {
        let entry = self.entry(id).await?;
        let guard = entry.lock().await;
        Ok(guard.clone())
    }

    /// Returns deep-copied snapshots of every debate.
    pub async fn list(&self) -> Vec<DebateState> {
        let map = self.records.read().await;
        let entries: Vec<Entry> = map.values().cloned().collect();
        drop(map);
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(entry.lock().await.clone());
        }
        snapshots
    }

    /// Applies `mutator` to the debate's state under its per-entry lock
    /// and returns the resulting snapshot. `mutator` must not perform
    /// blocking I/O or touch other debates.
    pub async fn update<F>(&self, id: Uuid, mutator: F) -> Result<DebateState, EngineError>
    where
        F: FnOnce(&mut DebateState),
    {
        let entry = self.entry(id).await?;
        let mut guard = entry.lock().await;
        mutator(&mut guard);
        Ok(guard.clone())
    }

    /// Removes a debate record entirely.
    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        let mut map = self.records.write().await;
        map.remove(&id).ok_or(EngineError::NotFound(id))?;
        Ok(())
    }

    async fn entry(&self, id: Uuid) -> Result<Entry, EngineError> {
        let map = self.records.read().await;
        map.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }
}
