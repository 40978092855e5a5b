//! In-memory execution store.

use std::collections::HashMap;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExecutionStore, StoreResult};
use crate::record::{ExecutionRecord, NewExecution, UpdateExecution};

/// Execution store backed by a process-local map.
///
/// Suitable for tests and single-process deployments; offers the same
/// read-then-write consistency the engine expects from a real database
/// within one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, ExecutionRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn insert_execution(&self, new: NewExecution) -> StoreResult<ExecutionRecord> {
        let record = new.into_record();
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_execution(&self, id: Uuid) -> StoreResult<Option<ExecutionRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update_execution(
        &self,
        id: Uuid,
        update: UpdateExecution,
    ) -> StoreResult<Option<ExecutionRecord>> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => {
                update.apply_to(record);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn latest_active_for_graph(
        &self,
        graph_id: Uuid,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<ExecutionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| {
                record.graph_id == graph_id
                    && record.is_active()
                    && Some(record.id) != exclude
            })
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn list_active_before(&self, cutoff: Timestamp) -> StoreResult<Vec<ExecutionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.is_active() && record.activity_anchor() < cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ExecutionStatus;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        let record = store
            .insert_execution(NewExecution::for_graph(Uuid::new_v4()))
            .await
            .unwrap();

        let found = store.find_execution(record.id).await.unwrap();
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let store = MemoryStore::new();
        let result = store
            .update_execution(Uuid::new_v4(), UpdateExecution::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_latest_active_prefers_newest() {
        let store = MemoryStore::new();
        let graph_id = Uuid::new_v4();
        let first = store
            .insert_execution(NewExecution::for_graph(graph_id))
            .await
            .unwrap();
        let second = store
            .insert_execution(NewExecution::for_graph(graph_id))
            .await
            .unwrap();

        let latest = store.latest_active_for_graph(graph_id, None).await.unwrap();
        assert_eq!(latest.map(|r| r.id), Some(second.id));

        let excluded = store
            .latest_active_for_graph(graph_id, Some(second.id))
            .await
            .unwrap();
        assert_eq!(excluded.map(|r| r.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_latest_active_ignores_finished() {
        let store = MemoryStore::new();
        let graph_id = Uuid::new_v4();
        let record = store
            .insert_execution(NewExecution::for_graph(graph_id))
            .await
            .unwrap();

        store
            .update_execution(
                record.id,
                UpdateExecution {
                    status: Some(ExecutionStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(
            store
                .latest_active_for_graph(graph_id, None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_active_before_cutoff() {
        let store = MemoryStore::new();
        let record = store
            .insert_execution(NewExecution::for_graph(Uuid::new_v4()))
            .await
            .unwrap();

        let future = record.created_at + jiff::SignedDuration::from_secs(1);
        let stale = store.list_active_before(future).await.unwrap();
        assert_eq!(stale.len(), 1);

        let past = record.created_at - jiff::SignedDuration::from_secs(1);
        assert!(store.list_active_before(past).await.unwrap().is_empty());
    }
}
