use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::Snapshot;
use crate::error::{PipelineError, Result};

/// Where snapshots are persisted. Backends only append and replay; they never
/// reorder or delete.
#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Every stored snapshot, in append order.
    async fn load_all(&self) -> anyhow::Result<Vec<Snapshot>>;
    async fn append(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Keeps nothing beyond the process lifetime.
#[derive(Default)]
pub struct MemoryBackend {
    snapshots: Mutex<Vec<Snapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn load_all(&self) -> anyhow::Result<Vec<Snapshot>> {
        Ok(self.snapshots.lock().await.clone())
    }

    async fn append(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.snapshots.lock().await.push(snapshot.clone());
        Ok(())
    }
}

/// Append-only history of snapshots, one per process, shared by reference.
///
/// Appends are serialized: the write lock is held across the backend write, so
/// the in-memory order always matches the persisted order.
pub struct SnapshotStore {
    backend: Arc<dyn SnapshotBackend>,
    snapshots: RwLock<Vec<Snapshot>>,
}

impl SnapshotStore {
    /// Replay whatever the backend already holds.
    pub async fn open(backend: Arc<dyn SnapshotBackend>) -> Result<Self> {
        let snapshots = backend.load_all().await.map_err(PipelineError::Storage)?;
        info!(snapshots = snapshots.len(), "snapshot store opened");
        Ok(Self {
            backend,
            snapshots: RwLock::new(snapshots),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
            snapshots: RwLock::new(Vec::new()),
        }
    }

    /// Rejects a snapshot older than the newest one already stored for its topic.
    pub async fn append(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;

        if let Some(newest) = snapshots
            .iter()
            .filter(|s| s.topic() == snapshot.topic())
            .map(|s| s.timestamp())
            .max()
        {
            if snapshot.timestamp() < newest {
                return Err(PipelineError::invariant(format!(
                    "snapshot for '{}' at {} is older than the latest one at {}",
                    snapshot.topic(),
                    snapshot.timestamp().to_rfc3339(),
                    newest.to_rfc3339()
                )));
            }
        }

        self.backend.append(&snapshot).await.map_err(PipelineError::Storage)?;
        debug!(topic = %snapshot.topic(), timestamp = %snapshot.timestamp(), "snapshot appended");
        snapshots.push(snapshot);
        Ok(())
    }

    /// Snapshots for `topic` in append order.
    pub async fn history(&self, topic: &str) -> Vec<Snapshot> {
        let topic = topic.trim();
        self.snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.topic() == topic)
            .cloned()
            .collect()
    }

    pub async fn latest(&self, topic: &str) -> Option<Snapshot> {
        let topic = topic.trim();
        self.snapshots
            .read()
            .await
            .iter()
            .rev()
            .find(|s| s.topic() == topic)
            .cloned()
    }

    pub async fn find(&self, topic: &str, timestamp: DateTime<Utc>) -> Option<Snapshot> {
        let topic = topic.trim();
        self.snapshots
            .read()
            .await
            .iter()
            .find(|s| s.topic() == topic && s.timestamp() == timestamp)
            .cloned()
    }

    /// Distinct topics in order of first appearance.
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for s in self.snapshots.read().await.iter() {
            if !topics.iter().any(|t| t == s.topic()) {
                topics.push(s.topic().to_string());
            }
        }
        topics
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}
