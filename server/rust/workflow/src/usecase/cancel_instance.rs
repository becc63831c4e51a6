use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::workflow_instance::WorkflowInstance;
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};
use crate::domain::service::{AssignmentResolver, TransitionEngine, TransitionError};
use crate::infrastructure::kafka_producer::{NotificationDispatcher, WorkflowEvent};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};
use crate::usecase::notification::dispatch_all;

#[derive(Debug, Clone)]
pub struct CancelInstanceInput {
    pub instance_id: String,
    pub actor_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CancelInstanceError {
    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("instance is not active: {0}")]
    InstanceNotActive(String),

    #[error("actor is not authorized to cancel this instance: {0}")]
    NotAuthorized(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for CancelInstanceError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// CancelInstanceUseCase はインスタンスを取り消す。
/// 現在の担当者または上書き権限を持つアクターのみ実行できる。
pub struct CancelInstanceUseCase {
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    resolver: Arc<AssignmentResolver>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    engine: TransitionEngine,
    retry: ConflictRetryPolicy,
}

impl CancelInstanceUseCase {
    pub fn new(
        instance_repo: Arc<dyn WorkflowInstanceRepository>,
        resolver: Arc<AssignmentResolver>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            instance_repo,
            resolver,
            dispatcher,
            engine: TransitionEngine::new(),
            retry: ConflictRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(
        &self,
        input: &CancelInstanceInput,
    ) -> Result<WorkflowInstance, CancelInstanceError> {
        let instance = retry_on_conflict(&self.retry, || self.try_cancel(input)).await?;

        let event = WorkflowEvent::transition(&instance, Utc::now());
        dispatch_all(self.dispatcher.as_ref(), &[event]).await;
        Ok(instance)
    }

    async fn try_cancel(
        &self,
        input: &CancelInstanceInput,
    ) -> Result<WorkflowInstance, CancelInstanceError> {
        let mut instance = self
            .instance_repo
            .find_by_id(&input.instance_id)
            .await
            .map_err(|e| CancelInstanceError::Internal(e.to_string()))?
            .ok_or_else(|| CancelInstanceError::NotFound(input.instance_id.clone()))?;

        if !instance.is_active() {
            return Err(CancelInstanceError::InstanceNotActive(format!(
                "{} is {}",
                instance.id, instance.status
            )));
        }

        let assignee_id = instance
            .open_execution()
            .and_then(|e| e.assignee_id.clone());
        let authorized = self
            .resolver
            .is_authorized(&input.actor_id, assignee_id.as_deref())
            .await
            .map_err(|e| CancelInstanceError::Internal(e.to_string()))?;
        if !authorized {
            return Err(CancelInstanceError::NotAuthorized(input.actor_id.clone()));
        }

        let now = Utc::now();
        let records = self
            .engine
            .cancel(&mut instance, &input.actor_id, input.reason.as_deref(), now)
            .map_err(|e| match e {
                TransitionError::InstanceNotActive { id, .. } => {
                    CancelInstanceError::InstanceNotActive(id)
                }
                other => CancelInstanceError::Internal(other.to_string()),
            })?;
        let read_version = instance.bump_version(now);

        self.instance_repo
            .save(&instance, read_version, &records)
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    CancelInstanceError::ConcurrentModification(e.to_string())
                }
                RepositoryError::NotFound(id) => CancelInstanceError::NotFound(id),
                other => CancelInstanceError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            claim_id = %instance.claim_id,
            actor_id = %input.actor_id,
            reason = input.reason.as_deref().unwrap_or(""),
            "workflow instance cancelled"
        );
        Ok(instance)
    }
}
