use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::entity::sub_task::SubTask;
use crate::domain::repository::{RepositoryError, WorkflowInstanceRepository};
use crate::usecase::conflict_retry::{retry_on_conflict, ConflictError, ConflictRetryPolicy};

#[derive(Debug, Clone)]
pub struct CompleteSubTaskInput {
    pub execution_id: String,
    pub key: String,
    pub actor_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CompleteSubTaskError {
    #[error("step execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("step execution is not open: {0}")]
    ExecutionNotOpen(String),

    #[error("sub-task not found: {0}")]
    SubTaskNotFound(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConflictError for CompleteSubTaskError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// CompleteSubTaskUseCase はサブタスクを完了にする。
/// 完了済みのサブタスクに対しては書き込みを行わず、記録済みの内容をそのまま返す。
pub struct CompleteSubTaskUseCase {
    instance_repo: Arc<dyn WorkflowInstanceRepository>,
    retry: ConflictRetryPolicy,
}

impl CompleteSubTaskUseCase {
    pub fn new(instance_repo: Arc<dyn WorkflowInstanceRepository>) -> Self {
        Self {
            instance_repo,
            retry: ConflictRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: ConflictRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn execute(
        &self,
        input: &CompleteSubTaskInput,
    ) -> Result<SubTask, CompleteSubTaskError> {
        retry_on_conflict(&self.retry, || self.try_complete(input)).await
    }

    async fn try_complete(
        &self,
        input: &CompleteSubTaskInput,
    ) -> Result<SubTask, CompleteSubTaskError> {
        let mut instance = self
            .instance_repo
            .find_by_execution_id(&input.execution_id)
            .await
            .map_err(|e| CompleteSubTaskError::Internal(e.to_string()))?
            .ok_or_else(|| CompleteSubTaskError::ExecutionNotFound(input.execution_id.clone()))?;

        let now = Utc::now();
        let execution = instance
            .find_execution_mut(&input.execution_id)
            .ok_or_else(|| CompleteSubTaskError::ExecutionNotFound(input.execution_id.clone()))?;
        let open = execution.is_open();
        let sub_task = execution
            .find_sub_task_mut(&input.key)
            .ok_or_else(|| CompleteSubTaskError::SubTaskNotFound(input.key.clone()))?;

        if sub_task.is_done() {
            return Ok(sub_task.clone());
        }
        if !open {
            return Err(CompleteSubTaskError::ExecutionNotOpen(input.execution_id.clone()));
        }
        sub_task.complete(&input.actor_id, now);
        let completed = sub_task.clone();

        let read_version = instance.bump_version(now);
        self.instance_repo
            .save(&instance, read_version, &[])
            .await
            .map_err(|e| match e {
                e @ RepositoryError::VersionConflict { .. } => {
                    CompleteSubTaskError::ConcurrentModification(e.to_string())
                }
                other => CompleteSubTaskError::Internal(other.to_string()),
            })?;

        info!(
            instance_id = %instance.id,
            execution_id = %input.execution_id,
            key = %input.key,
            actor_id = %input.actor_id,
            "sub-task completed"
        );
        Ok(completed)
    }
}
