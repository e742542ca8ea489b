use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::gateway::Gateways;
use crate::identity::Identity;
use crate::storage::{SessionStore, StorageError};
use crate::workflow::WorkflowEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(gateways: Gateways, store: SessionStore) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new(gateways, store)),
        }
    }
}

/// Live engines keyed by session id, backed by on-disk snapshots so a
/// restart resumes where each user left off.
pub struct SessionRegistry {
    engines: RwLock<HashMap<Uuid, WorkflowEngine>>,
    gateways: Gateways,
    store: SessionStore,
}

impl SessionRegistry {
    pub fn new(gateways: Gateways, store: SessionStore) -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            gateways,
            store,
        }
    }

    pub fn active(&self) -> usize {
        self.engines.read().len()
    }

    pub async fn create(&self, identity: Identity) -> Result<(Uuid, WorkflowEngine), StorageError> {
        let id = Uuid::new_v4();
        let engine = WorkflowEngine::new(identity, self.gateways.clone());
        self.engines.write().insert(id, engine.clone());
        self.persist(id, &engine).await?;
        info!("Session {id} created for user '{}'", engine.identity().user_id);
        Ok((id, engine))
    }

    /// Looks the session up in memory, then on disk.
    pub async fn get(&self, id: Uuid) -> Result<Option<WorkflowEngine>, StorageError> {
        let cached = self.engines.read().get(&id).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        let Some(snapshot) = self.store.load(id).await? else {
            return Ok(None);
        };
        let restored = WorkflowEngine::restore(snapshot, self.gateways.clone());
        info!("Session {id} restored at step {}", restored.view().step);
        // Another request may have restored it first; keep whichever won.
        let engine = self.engines.write().entry(id).or_insert(restored).clone();
        Ok(Some(engine))
    }

    pub async fn persist(&self, id: Uuid, engine: &WorkflowEngine) -> Result<(), StorageError> {
        self.store.save(id, &engine.snapshot()).await
    }

    /// Returns whether the session existed.
    pub async fn remove(&self, id: Uuid) -> Result<bool, StorageError> {
        let existed = self.engines.write().remove(&id).is_some();
        let on_disk = self.store.load(id).await?.is_some();
        self.store.remove(id).await?;
        if existed || on_disk {
            info!("Session {id} removed");
        }
        Ok(existed || on_disk)
    }
}
