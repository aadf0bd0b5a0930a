//! Snapshot storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Client-submitted snapshot, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    /// Studio panel the snapshot came from (code, scene, music, video)
    pub tool: String,
    pub name: String,
    /// Opaque panel state
    pub data: Value,
}

impl NewSnapshot {
    /// `tool` and `name` must be non-empty and `data` must be present
    pub fn is_valid(&self) -> bool {
        !self.tool.trim().is_empty() && !self.name.trim().is_empty() && !self.data.is_null()
    }
}

/// Stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub tool: String,
    pub name: String,
    pub data: Value,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Storage backend for shared snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn create(&self, snapshot: NewSnapshot) -> anyhow::Result<Snapshot>;

    async fn get(&self, id: &str) -> anyhow::Result<Option<Snapshot>>;
}

/// Process-lifetime store; contents are lost on restart
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn create(&self, snapshot: NewSnapshot) -> anyhow::Result<Snapshot> {
        let stored = Snapshot {
            id: uuid::Uuid::new_v4().to_string(),
            tool: snapshot.tool,
            name: snapshot.name,
            data: snapshot.data,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.snapshots
            .write()
            .await
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(id).cloned())
    }
}
