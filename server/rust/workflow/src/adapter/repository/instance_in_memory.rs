use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::entity::transition_record::{sort_history, TransitionRecord};
use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};

#[derive(Default)]
struct Store {
    instances: HashMap<String, WorkflowInstance>,
    history: Vec<TransitionRecord>,
}

/// InMemoryWorkflowInstanceRepository はインメモリのインスタンスリポジトリ。
/// 集約と履歴を1つのロックで保護し、version 比較と書き込みを同時に行う。
pub struct InMemoryWorkflowInstanceRepository {
    store: RwLock<Store>,
}

impl InMemoryWorkflowInstanceRepository {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store::default()),
        }
    }
}

impl Default for InMemoryWorkflowInstanceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowInstanceRepository for InMemoryWorkflowInstanceRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<WorkflowInstance>> {
        let store = self.store.read().await;
        Ok(store.instances.get(id).cloned())
    }

    async fn find_by_execution_id(
        &self,
        execution_id: &str,
    ) -> anyhow::Result<Option<WorkflowInstance>> {
        let store = self.store.read().await;
        Ok(store
            .instances
            .values()
            .find(|i| i.find_execution(execution_id).is_some())
            .cloned())
    }

    async fn find_active_by_claim(
        &self,
        claim_id: &str,
    ) -> anyhow::Result<Option<WorkflowInstance>> {
        let store = self.store.read().await;
        Ok(store
            .instances
            .values()
            .find(|i| i.claim_id == claim_id && i.is_active())
            .cloned())
    }

    async fn find_sla_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<WorkflowInstance>> {
        let store = self.store.read().await;
        let mut candidates: Vec<_> = store
            .instances
            .values()
            .filter(|i| {
                i.is_active()
                    && i.open_execution()
                        .is_some_and(|e| e.is_breached_at(now))
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(candidates)
    }

    async fn find_history(&self, instance_id: &str) -> anyhow::Result<Vec<TransitionRecord>> {
        let store = self.store.read().await;
        let mut records: Vec<_> = store
            .history
            .iter()
            .filter(|r| r.instance_id == instance_id)
            .cloned()
            .collect();
        sort_history(&mut records);
        Ok(records)
    }

    async fn create(
        &self,
        instance: &WorkflowInstance,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        if store
            .instances
            .values()
            .any(|i| i.claim_id == instance.claim_id && i.is_active())
        {
            return Err(RepositoryError::ClaimAlreadyActive(instance.claim_id.clone()));
        }
        if store.instances.contains_key(&instance.id) {
            return Err(RepositoryError::Storage(format!(
                "instance already exists: {}",
                instance.id
            )));
        }
        store.instances.insert(instance.id.clone(), instance.clone());
        store.history.extend_from_slice(records);
        Ok(())
    }

    async fn save(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        records: &[TransitionRecord],
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        let stored = store
            .instances
            .get(&instance.id)
            .ok_or_else(|| RepositoryError::NotFound(instance.id.clone()))?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }
        store.instances.insert(instance.id.clone(), instance.clone());
        store.history.extend_from_slice(records);
        Ok(())
    }
}
